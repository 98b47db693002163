//! Move the top-level declaration named at the cursor to another file.

use crate::document::Declaration;
use crate::error::{RefactorError, Result};
use crate::imports::ImportScratch;
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::DeclarationKind;
use crate::workspace;

pub struct MoveDeclaration;

impl MoveDeclaration {
    fn target<'a>(ctx: &ActionContext<'a>) -> Option<(&'a Declaration, &'a str)> {
        let destination = ctx.args.destination.as_deref().filter(|d| !d.trim().is_empty())?;
        let decl = ctx.file.declaration_at(ctx.range.start)?;
        let on_name = decl.name_range.start <= ctx.range.start && ctx.range.end <= decl.name_range.end;
        let movable = decl.kind.is_movable() || decl.kind == DeclarationKind::FunctionOverload;
        (on_name && movable).then_some((decl, destination))
    }

    fn require<'a>(ctx: &ActionContext<'a>) -> Result<(&'a Declaration, &'a str)> {
        Self::target(ctx).ok_or_else(|| RefactorError::not_applicable("no movable declaration name at cursor"))
    }
}

impl CodeFix for MoveDeclaration {
    fn name(&self) -> &'static str {
        "moveDeclaration"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Refactor
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx).is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let (decl, destination) = Self::require(ctx)?;
        Ok(format!(
            "Move {} \"{}\" to {}",
            decl.kind.label(),
            decl.name,
            destination
        ))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let (decl, destination) = Self::require(ctx)?;
        let destination = workspace::resolve_destination(&ctx.file.path, destination);
        let mut scratch = ImportScratch::new();
        let result = workspace::move_declaration(
            ctx.program,
            &ctx.file.path,
            &decl.name,
            &destination,
            ctx.config,
            &mut scratch,
        )?;
        Ok(result.batch.into())
    }
}
