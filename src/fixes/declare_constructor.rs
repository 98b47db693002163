//! `new Alpha('hello', 1)` on a class without a constructor (TS2554):
//! declares a constructor whose parameters are typed from the arguments.

use tree_sitter::Node;

use super::{capitalize, insert_member, type_container};
use crate::document::SourceFile;
use crate::edits::EditBatch;
use crate::error::{RefactorError, Result};
use crate::infer;
use crate::locator;
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::{self, SyntaxKind};

/// "Expected 0 arguments, but got 3."
const WRONG_ARGUMENT_COUNT: u32 = 2554;

pub struct DeclareConstructor;

struct Target<'a> {
    new_expr: Node<'a>,
    class_name: String,
    class_file: &'a SourceFile,
    class: Node<'a>,
}

fn has_constructor(class: Node, source: &str) -> bool {
    class
        .child_by_field_name("body")
        .map(syntax::named_children)
        .unwrap_or_default()
        .into_iter()
        .any(|m| {
            SyntaxKind::of(m) == SyntaxKind::MethodDefinition
                && m.child_by_field_name("name")
                    .is_some_and(|n| syntax::node_text(n, source) == "constructor")
        })
}

fn extends_something(class: Node, source: &str) -> bool {
    syntax::children(class)
        .into_iter()
        .any(|c| c.kind() == "class_heritage" && syntax::node_text(c, source).trim_start().starts_with("extends"))
}

/// `aString0` for a `string` argument in position 0.
fn parameter_name(ty: &str, index: usize) -> String {
    let word: String = ty.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
    let word = if !word.is_empty() {
        word
    } else if ty.starts_with('(') {
        "Function".to_string()
    } else if ty.starts_with('{') {
        "Object".to_string()
    } else {
        "Arg".to_string()
    };
    format!("a{}{}", capitalize(&word), index)
}

fn argument_type(arg: Node, source: &str) -> String {
    match infer::infer_expression(arg, source).as_deref() {
        None | Some("null") | Some("undefined") => infer::UNKNOWN.to_string(),
        Some(ty) => ty.to_string(),
    }
}

impl DeclareConstructor {
    fn target<'a>(ctx: &ActionContext<'a>) -> Result<Option<Target<'a>>> {
        let Some(node) = ctx.target() else {
            return Ok(None);
        };
        let Some(new_expr) = locator::find_ascendant_of_kind(node, SyntaxKind::NewExpression, true) else {
            return Ok(None);
        };
        let range = new_expr.byte_range();
        if !ctx
            .diagnostics
            .iter()
            .any(|d| d.code == WRONG_ARGUMENT_COUNT && d.overlaps(&range))
        {
            return Ok(None);
        }
        let Some(callee) = new_expr.child_by_field_name("constructor") else {
            return Ok(None);
        };
        let Some(symbol) = ctx.program.resolve_name_at(ctx.file, callee)? else {
            return Ok(None);
        };
        let Some((class_file, class)) = type_container(ctx.program, &symbol) else {
            return Ok(None);
        };
        if !matches!(
            SyntaxKind::of(class),
            SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration
        ) || has_constructor(class, &class_file.text)
        {
            return Ok(None);
        }
        Ok(Some(Target {
            new_expr,
            class_name: ctx.file.node_text(callee).to_string(),
            class_file,
            class,
        }))
    }

    fn require<'a>(ctx: &ActionContext<'a>) -> Result<Target<'a>> {
        Self::target(ctx)?.ok_or_else(|| RefactorError::not_applicable("no constructor call to declare"))
    }
}

impl CodeFix for DeclareConstructor {
    fn name(&self) -> &'static str {
        "declareConstructor"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::QuickFix
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx)?.is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let target = Self::require(ctx)?;
        Ok(format!("Declare constructor \"{}\"", target.class_name))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let target = Self::require(ctx)?;
        let source = ctx.file.text.as_str();
        let params: Vec<String> = syntax::arguments_of(target.new_expr)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
                let ty = argument_type(arg, source);
                format!("{}: {}", parameter_name(&ty, i), ty)
            })
            .collect();

        let mut body = Vec::new();
        if extends_something(target.class, &target.class_file.text) {
            body.push("    super();".to_string());
        }
        body.push("    throw new Error('Not implemented');".to_string());
        let constructor = format!("constructor({}) {{\n{}\n}}", params.join(", "), body.join("\n"));

        let Some(class_body) = target.class.child_by_field_name("body") else {
            return Err(RefactorError::resolution(format!("body of class {}", target.class_name)));
        };
        let mut batch = EditBatch::new();
        batch.push(insert_member(target.class_file, class_body, &constructor, true));
        Ok(batch.into())
    }
}
