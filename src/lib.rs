//! Refactoring code actions for TypeScript projects, served over LSP.

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod edits;
pub mod error;
pub mod fixes;
pub mod imports;
pub mod infer;
pub mod locator;
pub mod marker;
pub mod parser;
pub mod program;
pub mod references;
pub mod registry;
pub mod reorder;
pub mod server;
pub mod syntax;
pub mod workspace;
