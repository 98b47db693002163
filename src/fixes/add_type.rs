//! Add an explicit type to a declaration that has none: `: T` after a
//! variable, parameter or property name, or after a function's parameter list.

use tree_sitter::Node;

use crate::edits::{self, EditBatch};
use crate::error::{RefactorError, Result};
use crate::infer;
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::{self, SyntaxKind};

pub struct AddType;

struct Target {
    label: &'static str,
    name: String,
    insert_at: usize,
    ty: String,
}

/// End of a name, past an optional `?` marker.
fn name_end(owner: Node, name: Node) -> usize {
    match name.next_sibling() {
        Some(next) if next.kind() == "?" && next.parent() == Some(owner) => next.end_byte(),
        _ => name.end_byte(),
    }
}

fn typed_binding(node: Node, source: &str, name_field: &str, label: &'static str) -> Option<Target> {
    if infer::declared_type(node, source).is_some() {
        return None;
    }
    let name = node.child_by_field_name(name_field)?;
    if !matches!(SyntaxKind::of(name), SyntaxKind::Identifier | SyntaxKind::PropertyIdentifier) {
        return None;
    }
    let value = node.child_by_field_name("value")?;
    Some(Target {
        label,
        name: syntax::node_text(name, source).to_string(),
        insert_at: name_end(node, name),
        ty: infer::infer_expression(value, source)?,
    })
}

fn function_name(node: Node, source: &str) -> String {
    node.child_by_field_name("name")
        .or_else(|| {
            let parent = node.parent()?;
            (SyntaxKind::of(parent) == SyntaxKind::VariableDeclarator)
                .then(|| parent.child_by_field_name("name"))
                .flatten()
        })
        .map(|n| syntax::node_text(n, source).to_string())
        .unwrap_or_default()
}

fn typed_function(node: Node, source: &str, label: &'static str) -> Option<Target> {
    if node.child_by_field_name("return_type").is_some() {
        return None;
    }
    let params = node.child_by_field_name("parameters")?;
    let name = function_name(node, source);
    if label == "method" && matches!(name.as_str(), "constructor" | "get" | "set") {
        return None;
    }
    Some(Target {
        label,
        name,
        insert_at: params.end_byte(),
        ty: infer::infer_return_type(node, source)?,
    })
}

/// A declaration without a declared type, and what to add to it.
fn typeable(node: Node, source: &str) -> Option<Target> {
    match SyntaxKind::of(node) {
        SyntaxKind::VariableDeclarator => typed_binding(node, source, "name", "variable"),
        SyntaxKind::RequiredParameter | SyntaxKind::OptionalParameter => {
            typed_binding(node, source, "pattern", "parameter")
        }
        SyntaxKind::PublicFieldDefinition => typed_binding(node, source, "name", "property"),
        SyntaxKind::FunctionDeclaration | SyntaxKind::GeneratorFunctionDeclaration => {
            typed_function(node, source, "function")
        }
        SyntaxKind::MethodDefinition => typed_function(node, source, "method"),
        SyntaxKind::FunctionExpression => typed_function(node, source, "function"),
        SyntaxKind::ArrowFunction => typed_function(node, source, "arrow function"),
        _ => None,
    }
}

impl AddType {
    /// The node itself, its parent, or one of its children.
    fn target(ctx: &ActionContext) -> Option<Target> {
        let node = ctx.target()?;
        let source = ctx.file.text.as_str();
        typeable(node, source)
            .or_else(|| node.parent().and_then(|p| typeable(p, source)))
            .or_else(|| {
                syntax::named_children(node)
                    .into_iter()
                    .find_map(|child| typeable(child, source))
            })
    }

    fn require(ctx: &ActionContext) -> Result<Target> {
        Self::target(ctx).ok_or_else(|| RefactorError::not_applicable("no untyped declaration"))
    }
}

impl CodeFix for AddType {
    fn name(&self) -> &'static str {
        "addType"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Refactor
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx).is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let target = Self::require(ctx)?;
        Ok(format!("Add type to {} \"{}\"", target.label, target.name))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let target = Self::require(ctx)?;
        let mut batch = EditBatch::new();
        batch.push(edits::insert(&ctx.file.path, format!(": {}", target.ty), target.insert_at));
        Ok(batch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefactorConfig;
    use crate::program::Program;
    use crate::registry::ActionArgs;
    use std::path::PathBuf;

    fn add_type(text: &str, at: usize) -> Option<(String, String)> {
        let path = PathBuf::from("/p/a.ts");
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, &[], &config, &args);
        if !AddType.predicate(&ctx).unwrap() {
            return None;
        }
        let description = AddType.description(&ctx).unwrap();
        let out = AddType.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        Some((description, out[&path].clone()))
    }

    #[test]
    fn test_variable() {
        let (description, out) = add_type("const a = 1\n", 6).unwrap();
        assert_eq!(description, "Add type to variable \"a\"");
        assert_eq!(out, "const a: number = 1\n");
    }

    #[test]
    fn test_function_return_type() {
        let text = "function f(x: number) { return 'a' }\n";
        let (description, out) = add_type(text, 9).unwrap();
        assert_eq!(description, "Add type to function \"f\"");
        assert_eq!(out, "function f(x: number): string { return 'a' }\n");
    }

    #[test]
    fn test_parameter_default() {
        let text = "class K {\n  m(d = true) {}\n}\n";
        let at = text.find("d =").unwrap();
        let (description, out) = add_type(text, at).unwrap();
        assert_eq!(description, "Add type to parameter \"d\"");
        assert_eq!(out, "class K {\n  m(d: boolean = true) {}\n}\n");
    }

    #[test]
    fn test_not_offered_for_typed_or_uninitialized() {
        assert!(add_type("const b: number = 1\n", 6).is_none());
        assert!(add_type("let c\n", 4).is_none());
    }
}
