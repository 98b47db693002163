//! `const a = 1; a = 2` - reassigning a constant. Offers to change the
//! declaring `const` to `let` (or whatever `const2let.changeTo` says).

use tree_sitter::Node;

use crate::document::SourceFile;
use crate::edits::{self, EditBatch};
use crate::error::{RefactorError, Result};
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::{self, SyntaxKind};

/// "Cannot assign to 'a' because it is a constant" (old and new wording).
const ASSIGN_TO_CONST: [u32; 2] = [2540, 2588];

pub struct ConstToLet;

/// Whether `id` is the target of an assignment, compound assignment or `++`/`--`.
fn is_assigned(id: Node) -> bool {
    let Some(parent) = id.parent() else {
        return false;
    };
    match SyntaxKind::of(parent) {
        SyntaxKind::AssignmentExpression | SyntaxKind::AugmentedAssignmentExpression => {
            parent.child_by_field_name("left") == Some(id)
        }
        SyntaxKind::UpdateExpression => parent.child_by_field_name("argument") == Some(id),
        _ => false,
    }
}

fn declares(declaration: Node, name: &str, source: &str) -> bool {
    syntax::named_children(declaration).into_iter().any(|declarator| {
        SyntaxKind::of(declarator) == SyntaxKind::VariableDeclarator
            && declarator
                .child_by_field_name("name")
                .is_some_and(|n| syntax::node_text(n, source) == name)
    })
}

/// The `const`/`let` keyword of a lexical declaration.
fn kind_token(declaration: Node) -> Option<Node> {
    declaration
        .child_by_field_name("kind")
        .or_else(|| syntax::children(declaration).into_iter().find(|c| matches!(c.kind(), "const" | "let")))
}

/// Walks scopes outwards to the lexical declaration binding `id`. Returns the
/// `const` keyword only when the innermost binding is a `const`.
fn const_keyword<'tree>(file: &'tree SourceFile, id: Node<'tree>) -> Option<Node<'tree>> {
    let name = file.node_text(id);
    let mut scope = id.parent();
    while let Some(current) = scope {
        if SyntaxKind::of(current).is_function_like() {
            let shadowed = syntax::parameters_of(current).unwrap_or_default().into_iter().any(|p| {
                let pattern = p.child_by_field_name("pattern").unwrap_or(p);
                file.node_text(pattern) == name
            });
            if shadowed {
                return None;
            }
        }
        for child in syntax::named_children(current) {
            let declaration = match SyntaxKind::of(child) {
                SyntaxKind::ExportStatement => match child.child_by_field_name("declaration") {
                    Some(d) => d,
                    None => continue,
                },
                _ => child,
            };
            match SyntaxKind::of(declaration) {
                SyntaxKind::LexicalDeclaration if declares(declaration, name, &file.text) => {
                    return kind_token(declaration).filter(|k| file.node_text(*k) == "const");
                }
                SyntaxKind::VariableDeclaration if declares(declaration, name, &file.text) => return None,
                _ => {}
            }
        }
        scope = current.parent();
    }
    None
}

impl ConstToLet {
    fn target<'a>(ctx: &ActionContext<'a>) -> Option<(Node<'a>, Node<'a>)> {
        let id = ctx.target()?;
        if SyntaxKind::of(id) != SyntaxKind::Identifier || !is_assigned(id) {
            return None;
        }
        if !ASSIGN_TO_CONST
            .iter()
            .any(|code| ctx.diagnostic_at(*code, id.start_byte()).is_some())
        {
            return None;
        }
        let keyword = const_keyword(ctx.file, id)?;
        Some((id, keyword))
    }
}

impl CodeFix for ConstToLet {
    fn name(&self) -> &'static str {
        "const2let"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::QuickFix
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx).is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let (id, _) = Self::target(ctx).ok_or_else(|| RefactorError::not_applicable("no reassigned constant"))?;
        let name = ctx.file.node_text(id);
        Ok(format!(
            "Change \"const {}\" to \"{} {}\"",
            name, ctx.config.const2let.change_to, name
        ))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let (_, keyword) = Self::target(ctx).ok_or_else(|| RefactorError::not_applicable("no reassigned constant"))?;
        let mut batch = EditBatch::new();
        batch.push(edits::build(
            &ctx.file.path,
            ctx.config.const2let.change_to.clone(),
            keyword.start_byte(),
            keyword.end_byte() - keyword.start_byte(),
        ));
        Ok(batch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefactorConfig;
    use crate::diagnostics::Diagnostic;
    use crate::program::Program;
    use crate::registry::ActionArgs;
    use std::path::PathBuf;

    fn diagnostic(code: u32, start: usize) -> Diagnostic {
        Diagnostic {
            code,
            start,
            length: 1,
            message_text: "Cannot assign to 'a' because it is a constant.".to_string(),
        }
    }

    fn run(text: &str, at: usize, diagnostics: &[Diagnostic], config: &RefactorConfig) -> Option<(String, String)> {
        let path = PathBuf::from("/p/a.ts");
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, diagnostics, config, &args);
        if !ConstToLet.predicate(&ctx).unwrap() {
            return None;
        }
        let description = ConstToLet.description(&ctx).unwrap();
        let out = ConstToLet.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        Some((description, out[&path].clone()))
    }

    #[test]
    fn test_changes_const_to_let() {
        let text = "const a = 1\na = 2\n";
        let (description, out) = run(text, 12, &[diagnostic(2588, 12)], &RefactorConfig::default()).unwrap();
        assert_eq!(description, "Change \"const a\" to \"let a\"");
        assert_eq!(out, "let a = 1\na = 2\n");
    }

    #[test]
    fn test_configured_replacement_and_inner_scope() {
        let mut config = RefactorConfig::default();
        config.const2let.change_to = "var".to_string();
        let text = "const a = 1\nfunction f() {\n  const a = 2\n  a += 1\n}\n";
        let at = text.find("a += 1").unwrap();
        let (_, out) = run(text, at, &[diagnostic(2540, at)], &config).unwrap();
        assert_eq!(out, "const a = 1\nfunction f() {\n  var a = 2\n  a += 1\n}\n");
    }

    #[test]
    fn test_requires_diagnostic_and_const() {
        let config = RefactorConfig::default();
        assert!(run("const a = 1\na = 2\n", 12, &[], &config).is_none());
        assert!(run("const a = 1\na = 2\n", 12, &[diagnostic(2339, 12)], &config).is_none());
        assert!(run("let a = 1\na = 2\n", 10, &[diagnostic(2588, 10)], &config).is_none());
        let shadowed = "const a = 1\nfunction f(a) { a = 2 }\n";
        let at = shadowed.find("a = 2").unwrap();
        assert!(run(shadowed, at, &[diagnostic(2588, at)], &config).is_none());
    }
}
