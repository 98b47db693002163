//! `x.missing` where `x`'s type has no such member (TS2339): declares the
//! member on the interface, class or object literal behind `x`. A call
//! declares a method typed from its arguments, anything else a property.

use tree_sitter::Node;

use super::type_container;
use crate::document::SourceFile;
use crate::edits::EditBatch;
use crate::error::{RefactorError, Result};
use crate::infer;
use crate::locator;
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::{self, SyntaxKind};

/// "Property 'bar' does not exist on type ..."
const MISSING_PROPERTY: u32 = 2339;

pub struct DeclareMember;

struct Target<'a> {
    name: Node<'a>,
    access: Node<'a>,
    body_file: &'a SourceFile,
    body: Node<'a>,
}

/// Declarator or parameter binding `id`, searched from the innermost scope out.
fn binding_of<'tree>(file: &'tree SourceFile, id: Node<'tree>) -> Option<Node<'tree>> {
    let name = file.node_text(id);
    let mut scope = id.parent();
    while let Some(current) = scope {
        if SyntaxKind::of(current).is_function_like() {
            let param = syntax::parameters_of(current).unwrap_or_default().into_iter().find(|p| {
                let pattern = p.child_by_field_name("pattern").unwrap_or(*p);
                file.node_text(pattern) == name
            });
            if param.is_some() {
                return param;
            }
        }
        for child in syntax::named_children(current) {
            let declaration = if SyntaxKind::of(child) == SyntaxKind::ExportStatement {
                match child.child_by_field_name("declaration") {
                    Some(d) => d,
                    None => continue,
                }
            } else {
                child
            };
            if !matches!(
                SyntaxKind::of(declaration),
                SyntaxKind::LexicalDeclaration | SyntaxKind::VariableDeclaration
            ) {
                continue;
            }
            let declarator = syntax::named_children(declaration).into_iter().find(|d| {
                d.child_by_field_name("name")
                    .is_some_and(|n| file.node_text(n) == name)
            });
            if declarator.is_some() {
                return declarator;
            }
        }
        scope = current.parent();
    }
    None
}

/// `Hello` out of `Hello` or `Hello<T>`; `None` for anything structural.
fn type_name(ty: &str) -> Option<&str> {
    let name = ty.split('<').next()?.trim();
    let simple = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    simple.then_some(name)
}

impl DeclareMember {
    fn body_of_type<'a>(ctx: &ActionContext<'a>, ty: &str) -> Result<Option<(&'a SourceFile, Node<'a>)>> {
        let Some(name) = type_name(ty) else {
            return Ok(None);
        };
        let Some(symbol) = ctx.program.resolve_top_level_name(ctx.file, name)? else {
            return Ok(None);
        };
        Ok(type_container(ctx.program, &symbol)
            .and_then(|(file, node)| node.child_by_field_name("body").map(|body| (file, body))))
    }

    fn body_of_class<'a>(ctx: &ActionContext<'a>, callee: Node<'a>) -> Result<Option<(&'a SourceFile, Node<'a>)>> {
        match ctx.program.resolve_name_at(ctx.file, callee)? {
            Some(symbol) => Ok(type_container(ctx.program, &symbol)
                .and_then(|(file, node)| node.child_by_field_name("body").map(|body| (file, body)))),
            None => Ok(None),
        }
    }

    /// The body that should receive members accessed on `object`.
    fn container<'a>(ctx: &ActionContext<'a>, object: Node<'a>) -> Result<Option<(&'a SourceFile, Node<'a>)>> {
        let source = ctx.file.text.as_str();
        match SyntaxKind::of(object) {
            SyntaxKind::This => Ok(enclosing_class(object)
                .and_then(|class| class.child_by_field_name("body"))
                .map(|body| (ctx.file, body))),
            SyntaxKind::Identifier => {
                let Some(binding) = binding_of(ctx.file, object) else {
                    return Ok(None);
                };
                if let Some(ty) = infer::declared_type(binding, source) {
                    return Self::body_of_type(ctx, &ty);
                }
                match binding.child_by_field_name("value") {
                    Some(value) if SyntaxKind::of(value) == SyntaxKind::Object => Ok(Some((ctx.file, value))),
                    Some(value) if SyntaxKind::of(value) == SyntaxKind::NewExpression => {
                        match value.child_by_field_name("constructor") {
                            Some(callee) => Self::body_of_class(ctx, callee),
                            None => Ok(None),
                        }
                    }
                    _ => Ok(None),
                }
            }
            SyntaxKind::NewExpression => match object.child_by_field_name("constructor") {
                Some(callee) => Self::body_of_class(ctx, callee),
                None => Ok(None),
            },
            // `this.hello.grasp()`: the declared type of field `hello`.
            SyntaxKind::MemberExpression => {
                let (Some(inner), Some(property)) =
                    (object.child_by_field_name("object"), object.child_by_field_name("property"))
                else {
                    return Ok(None);
                };
                if SyntaxKind::of(inner) != SyntaxKind::This {
                    return Ok(None);
                }
                let field = enclosing_class(inner)
                    .and_then(|class| class.child_by_field_name("body"))
                    .map(syntax::named_children)
                    .unwrap_or_default()
                    .into_iter()
                    .find(|m| {
                        SyntaxKind::of(*m) == SyntaxKind::PublicFieldDefinition
                            && m.child_by_field_name("name")
                                .is_some_and(|n| ctx.file.node_text(n) == ctx.file.node_text(property))
                    });
                match field.and_then(|f| infer::declared_type(f, source)) {
                    Some(ty) => Self::body_of_type(ctx, &ty),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn target<'a>(ctx: &ActionContext<'a>) -> Result<Option<Target<'a>>> {
        let Some(name) = ctx.target() else {
            return Ok(None);
        };
        if SyntaxKind::of(name) != SyntaxKind::PropertyIdentifier
            || ctx.diagnostic_at(MISSING_PROPERTY, name.start_byte()).is_none()
        {
            return Ok(None);
        }
        let Some(access) = name.parent() else {
            return Ok(None);
        };
        if SyntaxKind::of(access) != SyntaxKind::MemberExpression || access.child_by_field_name("property") != Some(name)
        {
            return Ok(None);
        }
        let Some(object) = access.child_by_field_name("object") else {
            return Ok(None);
        };
        Ok(Self::container(ctx, object)?.map(|(body_file, body)| Target {
            name,
            access,
            body_file,
            body,
        }))
    }

    fn require<'a>(ctx: &ActionContext<'a>) -> Result<Target<'a>> {
        Self::target(ctx)?.ok_or_else(|| RefactorError::not_applicable("no missing member to declare"))
    }
}

fn enclosing_class(node: Node) -> Option<Node> {
    locator::find_ascendant(
        node,
        |n| matches!(SyntaxKind::of(n), SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration),
        false,
    )
}

/// The call `x.m(...)` when the access is its callee.
fn call_of(access: Node) -> Option<Node> {
    let parent = access.parent()?;
    (SyntaxKind::of(parent) == SyntaxKind::CallExpression && parent.child_by_field_name("function") == Some(access))
        .then_some(parent)
}

/// Type the surrounding code expects of `expr`: the assigned value, the
/// declared type of the variable it initializes, or the enclosing expression.
fn usage_type(expr: Node, source: &str) -> String {
    let Some(parent) = expr.parent() else {
        return infer::UNKNOWN.to_string();
    };
    let ty = match SyntaxKind::of(parent) {
        SyntaxKind::AssignmentExpression if parent.child_by_field_name("left") == Some(expr) => parent
            .child_by_field_name("right")
            .and_then(|right| infer::infer_expression(right, source)),
        SyntaxKind::VariableDeclarator => infer::declared_type(parent, source),
        SyntaxKind::BinaryExpression => infer::infer_expression(parent, source),
        _ => None,
    };
    ty.unwrap_or_else(|| infer::UNKNOWN.to_string())
}

impl CodeFix for DeclareMember {
    fn name(&self) -> &'static str {
        "declareMember"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::QuickFix
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx)?.is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let target = Self::require(ctx)?;
        Ok(format!("Declare missing member \"{}\"", ctx.file.node_text(target.name)))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let target = Self::require(ctx)?;
        let source = ctx.file.text.as_str();
        let name = ctx.file.node_text(target.name);
        let call = call_of(target.access);
        let ty = usage_type(call.unwrap_or(target.access), source);
        let container = SyntaxKind::of(target.body);

        let member = match call {
            Some(call) => {
                let params: Vec<String> = syntax::arguments_of(call)
                    .unwrap_or_default()
                    .into_iter()
                    .enumerate()
                    .map(|(i, arg)| format!("arg{}: {}", i, infer::infer_or_any(arg, source)))
                    .collect();
                let signature = format!("{}({}): {}", name, params.join(", "), ty);
                match container {
                    SyntaxKind::ClassBody | SyntaxKind::Object => {
                        format!("{} {{\n    throw new Error('Not Implemented')\n}}", signature)
                    }
                    _ => format!("{};", signature),
                }
            }
            None => match container {
                SyntaxKind::Object => format!("{}: null", name),
                _ => format!("{}: {};", name, ty),
            },
        };

        let mut batch = EditBatch::new();
        batch.push(super::insert_member(target.body_file, target.body, &member, false));
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

    fn declare(text: &str, member: &str) -> Option<(String, String)> {
        let path = PathBuf::from("/p/a.ts");
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let at = text.rfind(member).unwrap();
        let diagnostics = [Diagnostic {
            code: MISSING_PROPERTY,
            start: at,
            length: member.len(),
            message_text: format!("Property '{}' does not exist", member),
        }];
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);
        if !DeclareMember.predicate(&ctx).unwrap() {
            return None;
        }
        let description = DeclareMember.description(&ctx).unwrap();
        let out = DeclareMember.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        Some((description, out[&path].clone()))
    }

    #[test]
    fn test_method_on_object_literal() {
        let text = "const o = {\n  foo: () => { return 1 }\n}\nconst val: string[] = o.bar(1, ['w'], true)\n";
        let (description, out) = declare(text, "bar").unwrap();
        assert_eq!(description, "Declare missing member \"bar\"");
        assert_eq!(
            out,
            "const o = {\n  foo: () => { return 1 },\n  bar(arg0: number, arg1: string[], arg2: boolean): string[] {\n      throw new Error('Not Implemented')\n  }\n}\nconst val: string[] = o.bar(1, ['w'], true)\n"
        );
    }

    #[test]
    fn test_property_on_parameter_interface() {
        let text = "interface Hello {}\nfunction f(h: Hello) {\n  h.fromFunc = true\n}\n";
        let (_, out) = declare(text, "fromFunc").unwrap();
        assert_eq!(
            out,
            "interface Hello {\n    fromFunc: boolean;\n}\nfunction f(h: Hello) {\n  h.fromFunc = true\n}\n"
        );
    }

    #[test]
    fn test_property_on_this_class() {
        let text = "class C {\n  m() { return this.label + '!' }\n}\n";
        let (_, out) = declare(text, "label").unwrap();
        assert_eq!(out, "class C {\n  m() { return this.label + '!' }\n  label: string;\n}\n");
    }

    #[test]
    fn test_method_on_field_type() {
        let text = "interface Hello {\n  a: number\n}\nclass C {\n  hello: Hello\n  m(s: number[]) { this.hello.grasp(s) }\n}\n";
        let (_, out) = declare(text, "grasp").unwrap();
        assert!(out.starts_with("interface Hello {\n  a: number\n  grasp(arg0: any): any;\n}\n"));
    }

    #[test]
    fn test_needs_diagnostic_and_known_container() {
        assert!(declare("declare const x: any\nx.y = 1\n", "y").is_none());
        let path = PathBuf::from("/p/a.ts");
        let text = "const o = {}\no.z = 1\n";
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let at = text.rfind('z').unwrap();
        let ctx = ActionContext::new(&program, file, at..at, &[], &config, &args);
        assert!(!DeclareMember.predicate(&ctx).unwrap());
    }
}
