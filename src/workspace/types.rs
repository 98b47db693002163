//! Types for workspace operations.
//!
//! Contains result types for declaration moves and file/folder moves.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::edits::EditBatch;

/// Progress of a declaration move. Stages only advance in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MoveStage {
    Start,
    ImportsCopiedToDest,
    ExportsFixedAtOrigin,
    ReferencingFilesRepointed,
    DeclarationRelocated,
    ImportsOrganized,
    Done,
}

impl MoveStage {
    pub fn next(self) -> Option<MoveStage> {
        use MoveStage::*;
        match self {
            Start => Some(ImportsCopiedToDest),
            ImportsCopiedToDest => Some(ExportsFixedAtOrigin),
            ExportsFixedAtOrigin => Some(ReferencingFilesRepointed),
            ReferencingFilesRepointed => Some(DeclarationRelocated),
            DeclarationRelocated => Some(ImportsOrganized),
            ImportsOrganized => Some(Done),
            Done => None,
        }
    }
}

/// Result of a move declaration operation
#[derive(Debug)]
pub struct MoveResult {
    pub batch: EditBatch,
    pub stage: MoveStage,
    pub declaration_name: String,
    pub origin: PathBuf,
    pub destination: PathBuf,
    /// Files other than origin and destination whose imports were rewritten.
    pub references_updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveKind {
    File,
    Folder,
}

/// The most recent file or folder move, kept for a single undo step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub kind: MoveKind,
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl LastMove {
    /// The move that takes `dest` back to `source`.
    pub fn reversed(&self) -> LastMove {
        LastMove {
            kind: self.kind,
            source: self.dest.clone(),
            dest: self.source.clone(),
        }
    }
}

/// Result of a file or folder move
#[derive(Debug)]
pub struct FileMoveResult {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub files_updated: usize,
    pub batch: EditBatch,
    pub last_move: LastMove,
}
