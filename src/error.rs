//! Error taxonomy for refactor operations.
//!
//! Predicate and locator failures are local: they remove an action from the
//! offered list. Apply-time failures abort the whole operation so that either
//! every edit is returned or none is.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefactorError {
    /// The action does not apply at this location. Normal outcome, not logged as an error.
    #[error("not applicable: {0}")]
    NotApplicable(String),

    /// The locator or resolver found nothing to act on.
    #[error("could not resolve {what}")]
    ResolutionFailure { what: String },

    /// Several unrelated declarations share the target name.
    #[error("ambiguous target `{name}`: {candidates} declarations in {}", file.display())]
    AmbiguousTarget {
        name: String,
        file: PathBuf,
        candidates: usize,
    },

    /// The destination cannot receive the declaration (duplicate default export, name clash).
    #[error("conflicting destination {}: {reason}", file.display())]
    ConflictingDestination { file: PathBuf, reason: String },

    /// Malformed configuration or marker expression.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid permutation {permutation:?} for {count} parameters: {reason}")]
    InvalidPermutation {
        permutation: Vec<usize>,
        count: usize,
        reason: String,
    },

    /// Two edits of one operation overlap, or an edit falls outside its file.
    #[error("edit conflict in {}: {reason}", file.display())]
    EditConflict { file: PathBuf, reason: String },

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RefactorError {
    pub fn resolution(what: impl Into<String>) -> Self {
        RefactorError::ResolutionFailure { what: what.into() }
    }

    pub fn not_applicable(reason: impl Into<String>) -> Self {
        RefactorError::NotApplicable(reason.into())
    }

    /// Whether this outcome is an ordinary "does not apply" rather than a failure.
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, RefactorError::NotApplicable(_))
    }
}

pub type Result<T> = std::result::Result<T, RefactorError>;
