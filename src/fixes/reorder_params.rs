//! Reorder the parameters of the function at the cursor, and the arguments
//! of every call to it.

use crate::error::Result;
use crate::program::SymbolId;
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::reorder;

pub struct ReorderParams;

impl ReorderParams {
    fn permutation(ctx: &ActionContext) -> Vec<usize> {
        ctx.args
            .permutation
            .clone()
            .unwrap_or_else(|| ctx.config.default_permutation.clone())
    }

    fn target(ctx: &ActionContext) -> Result<Option<SymbolId>> {
        match reorder::target_at(ctx.program, ctx.file, ctx.range.start) {
            Ok((symbol, count)) if count > 1 => Ok(Some(symbol)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_applicable() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl CodeFix for ReorderParams {
    fn name(&self) -> &'static str {
        "reorderParams"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Refactor
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx)?.is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let symbol = reorder::target_at(ctx.program, ctx.file, ctx.range.start)?.0;
        Ok(format!(
            "Reorder parameters of \"{}\" ({:?})",
            symbol.name,
            Self::permutation(ctx)
        ))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let symbol = reorder::target_at(ctx.program, ctx.file, ctx.range.start)?.0;
        let batch = reorder::reorder_parameters(ctx.program, &symbol, &Self::permutation(ctx))?;
        Ok(batch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefactorConfig;
    use crate::error::RefactorError;
    use crate::program::Program;
    use crate::registry::ActionArgs;
    use std::path::PathBuf;

    #[test]
    fn test_reorders_across_files_with_default_permutation() {
        let lib = PathBuf::from("/p/lib.ts");
        let main = PathBuf::from("/p/main.ts");
        let main_text = "import { f } from './lib'\nf(1, 'a')\n";
        let program = Program::from_sources(vec![
            (lib.clone(), "export function f(a: number, b: string) { return a }\n".to_string()),
            (main.clone(), main_text.to_string()),
        ]);
        let file = program.file(&main).unwrap();
        let at = main_text.find("f(1").unwrap();
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, &[], &config, &args);

        assert!(ReorderParams.predicate(&ctx).unwrap());
        assert_eq!(ReorderParams.description(&ctx).unwrap(), "Reorder parameters of \"f\" ([1, 0])");
        let out = ReorderParams.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        assert_eq!(out[&lib], "export function f(b: string, a: number) { return a }\n");
        assert_eq!(out[&main], "import { f } from './lib'\nf('a', 1)\n");
    }

    #[test]
    fn test_single_parameter_and_bad_permutation() {
        let path = PathBuf::from("/p/a.ts");
        let text = "function one(a) {}\nfunction two(a, b) {}\n";
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let config = RefactorConfig::default();
        let args = ActionArgs::default();

        let at = text.find("one").unwrap();
        let ctx = ActionContext::new(&program, file, at..at, &[], &config, &args);
        assert!(!ReorderParams.predicate(&ctx).unwrap());

        let at = text.find("two").unwrap();
        let args = ActionArgs {
            permutation: Some(vec![0, 5]),
            destination: None,
        };
        let ctx = ActionContext::new(&program, file, at..at, &[], &config, &args);
        assert!(ReorderParams.predicate(&ctx).unwrap());
        assert!(matches!(
            ReorderParams.apply(&ctx),
            Err(RefactorError::InvalidPermutation { .. })
        ));
    }
}
