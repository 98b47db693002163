//! Move this file or its folder as directed by a marker line, or undo the
//! last move. The marker line itself is removed by the edit.

use crate::edits;
use crate::error::{RefactorError, Result};
use crate::marker::{self, Marker, MarkerCommand};
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix, MoveRecord};
use crate::workspace;

pub struct MoveFile;

impl MoveFile {
    fn marker(ctx: &ActionContext) -> Result<Option<Marker>> {
        let Some(marker) = marker::find_marker(&ctx.file.text, &ctx.config.marker_prefix)? else {
            return Ok(None);
        };
        if marker.command == MarkerCommand::UndoLastMove && ctx.last_move.is_none() {
            return Ok(None);
        }
        Ok(Some(marker))
    }

    fn require(ctx: &ActionContext) -> Result<Marker> {
        Self::marker(ctx)?.ok_or_else(|| RefactorError::not_applicable("no move marker in file"))
    }
}

impl CodeFix for MoveFile {
    fn name(&self) -> &'static str {
        "moveFile"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Refactor
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::marker(ctx)?.is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        Ok(Self::require(ctx)?.command.description())
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let marker = Self::require(ctx)?;
        let path = &ctx.file.path;
        let (result, move_record) = match &marker.command {
            MarkerCommand::MoveFileTo(dest) => {
                let result = workspace::move_file(ctx.program, path, dest)?;
                let record = MoveRecord::Recorded(result.last_move.clone());
                (result, record)
            }
            MarkerCommand::MoveFolderTo(dest) => {
                let result = workspace::move_folder(ctx.program, path, dest)?;
                let record = MoveRecord::Recorded(result.last_move.clone());
                (result, record)
            }
            MarkerCommand::UndoLastMove => {
                let last = ctx
                    .last_move
                    .ok_or_else(|| RefactorError::not_applicable("nothing to undo"))?;
                (workspace::undo_move(ctx.program, last)?, MoveRecord::Consumed)
            }
        };

        let mut batch = result.batch;
        batch.push(edits::delete(path, marker.line_range.clone()));
        Ok(ActionResult { batch, move_record })
    }
}
