//! Predicate/Action Registry.
//!
//! Every refactor is a [`CodeFix`]: a predicate over the node under the
//! cursor and the current diagnostics, a description, and an `apply` that
//! returns edits. The registry is built once and never changes; its order is
//! the order actions are offered in.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::config::RefactorConfig;
use crate::diagnostics::Diagnostic;
use crate::document::SourceFile;
use crate::edits::EditBatch;
use crate::error::{RefactorError, Result};
use crate::fixes;
use crate::locator;
use crate::program::Program;
use crate::workspace::LastMove;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    QuickFix,
    Refactor,
}

/// Arguments a client may pass along with an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionArgs {
    pub permutation: Option<Vec<usize>>,
    pub destination: Option<String>,
}

/// Everything a predicate or an apply may look at. Immutable.
pub struct ActionContext<'a> {
    pub program: &'a Program,
    pub file: &'a SourceFile,
    pub range: Range<usize>,
    pub diagnostics: &'a [Diagnostic],
    pub config: &'a RefactorConfig,
    pub args: &'a ActionArgs,
    pub last_move: Option<&'a LastMove>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        program: &'a Program,
        file: &'a SourceFile,
        range: Range<usize>,
        diagnostics: &'a [Diagnostic],
        config: &'a RefactorConfig,
        args: &'a ActionArgs,
    ) -> Self {
        Self {
            program,
            file,
            range,
            diagnostics,
            config,
            args,
            last_move: None,
        }
    }

    pub fn with_last_move(mut self, last_move: Option<&'a LastMove>) -> Self {
        self.last_move = last_move;
        self
    }

    /// Deepest node containing the requested range.
    pub fn target(&self) -> Option<Node<'a>> {
        locator::find_containing(self.file.root(), self.range.clone())
    }

    /// A diagnostic with `code` starting exactly at `start`.
    pub fn diagnostic_at(&self, code: u32, start: usize) -> Option<&'a Diagnostic> {
        self.diagnostics.iter().find(|d| d.code == code && d.start == start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub name: String,
    pub kind: ActionKind,
    pub description: String,
}

/// What an action did to the single-step move history. Committed by the
/// server only once the client has applied the edit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "move", rename_all = "camelCase")]
pub enum MoveRecord {
    #[default]
    Unchanged,
    Recorded(LastMove),
    Consumed,
}

#[derive(Debug, Default)]
pub struct ActionResult {
    pub batch: EditBatch,
    pub move_record: MoveRecord,
}

impl From<EditBatch> for ActionResult {
    fn from(batch: EditBatch) -> Self {
        Self {
            batch,
            move_record: MoveRecord::Unchanged,
        }
    }
}

pub trait CodeFix: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ActionKind;

    /// Whether the fix applies. `Err` is treated as "no" by the registry.
    fn predicate(&self, ctx: &ActionContext) -> Result<bool>;

    fn description(&self, ctx: &ActionContext) -> Result<String>;

    /// Only called after `predicate` returned `Ok(true)` for the same context.
    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult>;
}

pub struct Registry {
    fixes: Vec<Box<dyn CodeFix>>,
}

impl Registry {
    pub fn new(fixes: Vec<Box<dyn CodeFix>>) -> Self {
        Self { fixes }
    }

    /// The built-in fixes, in the order they are offered.
    pub fn builtin() -> Self {
        Self::new(vec![
            Box::new(fixes::ConstToLet),
            Box::new(fixes::DeclareConstructor),
            Box::new(fixes::DeclareMember),
            Box::new(fixes::ImplementInterface),
            Box::new(fixes::AddType),
            Box::new(fixes::ReorderParams),
            Box::new(fixes::MoveDeclaration),
            Box::new(fixes::MoveFile),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&dyn CodeFix> {
        self.fixes.iter().find(|f| f.name() == name).map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fixes.iter().map(|f| f.name()).collect()
    }

    /// Runs a predicate with errors and panics contained.
    fn matches(fix: &dyn CodeFix, ctx: &ActionContext) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| fix.predicate(ctx))) {
            Ok(Ok(matched)) => matched,
            Ok(Err(e)) => {
                tracing::debug!("{} predicate failed: {}", fix.name(), e);
                false
            }
            Err(_) => {
                tracing::warn!("{} predicate panicked", fix.name());
                false
            }
        }
    }

    /// Actions whose predicate holds at the context, in registration order.
    pub fn applicable(&self, ctx: &ActionContext) -> Vec<ActionDescriptor> {
        let mut actions = Vec::new();
        for fix in &self.fixes {
            if !Self::matches(fix.as_ref(), ctx) {
                continue;
            }
            match fix.description(ctx) {
                Ok(description) => actions.push(ActionDescriptor {
                    name: fix.name().to_string(),
                    kind: fix.kind(),
                    description,
                }),
                Err(e) => tracing::debug!("{} description failed: {}", fix.name(), e),
            }
        }
        actions
    }

    /// Re-checks the predicate, then applies the named action.
    pub fn apply(&self, name: &str, ctx: &ActionContext) -> Result<ActionResult> {
        let fix = self
            .get(name)
            .ok_or_else(|| RefactorError::UnknownAction(name.to_string()))?;
        if !Self::matches(fix, ctx) {
            return Err(RefactorError::not_applicable(format!(
                "{} does not apply at {}:{}",
                name,
                ctx.file.path.display(),
                ctx.range.start
            )));
        }
        let result = fix.apply(ctx)?;
        result.batch.validate(ctx.program)?;
        tracing::info!(
            "Applied {} in {}: {} edits in {} files",
            name,
            ctx.file.path.display(),
            result.batch.edits().len(),
            result.batch.files().len()
        );
        Ok(result)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
