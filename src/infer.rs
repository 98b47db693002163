//! Syntactic type inference for literals and simple expressions.
//!
//! There is no checker behind this: only what the expression spells out is
//! used. Literal types are widened to their base type (`1` is `number`).

use tree_sitter::Node;

use crate::syntax::{self, SyntaxKind};

pub const UNKNOWN: &str = "any";

/// Inferred type of an expression, widened; `None` when nothing can be said.
pub fn infer_expression(node: Node, source: &str) -> Option<String> {
    match SyntaxKind::of(node) {
        SyntaxKind::Number => Some("number".to_string()),
        SyntaxKind::String | SyntaxKind::TemplateString => Some("string".to_string()),
        SyntaxKind::True | SyntaxKind::False => Some("boolean".to_string()),
        SyntaxKind::Null => Some("null".to_string()),
        SyntaxKind::Undefined => Some("undefined".to_string()),
        SyntaxKind::ParenthesizedExpression => syntax::named_children(node)
            .first()
            .and_then(|inner| infer_expression(*inner, source)),
        SyntaxKind::Array => Some(infer_array(node, source)),
        SyntaxKind::Object => Some(infer_object(node, source)),
        SyntaxKind::NewExpression => node
            .child_by_field_name("constructor")
            .map(|c| syntax::node_text(c, source).to_string()),
        SyntaxKind::ArrowFunction | SyntaxKind::FunctionExpression => Some(function_type(node, source)),
        SyntaxKind::BinaryExpression => infer_binary(node, source),
        SyntaxKind::UnaryExpression => infer_unary(node, source),
        _ => match node.kind() {
            "regex" => Some("RegExp".to_string()),
            "as_expression" | "satisfies_expression" => syntax::named_children(node)
                .get(1)
                .map(|t| syntax::node_text(*t, source).to_string()),
            _ => None,
        },
    }
}

pub fn infer_or_any(node: Node, source: &str) -> String {
    infer_expression(node, source).unwrap_or_else(|| UNKNOWN.to_string())
}

fn union(types: Vec<String>) -> Option<String> {
    let mut unique: Vec<String> = Vec::new();
    for t in types {
        if !unique.contains(&t) {
            unique.push(t);
        }
    }
    match unique.len() {
        0 => None,
        1 => unique.pop(),
        _ => Some(unique.join(" | ")),
    }
}

fn infer_array(node: Node, source: &str) -> String {
    let elements: Vec<String> = syntax::named_children(node)
        .into_iter()
        .map(|e| infer_or_any(e, source))
        .collect();
    match union(elements) {
        None => format!("{}[]", UNKNOWN),
        Some(t) if t.contains(" | ") || t.contains("=>") => format!("({})[]", t),
        Some(t) => format!("{}[]", t),
    }
}

fn infer_object(node: Node, source: &str) -> String {
    let mut members = Vec::new();
    for member in syntax::named_children(node) {
        match SyntaxKind::of(member) {
            SyntaxKind::Pair => {
                let (Some(key), Some(value)) = (member.child_by_field_name("key"), member.child_by_field_name("value")) else {
                    continue;
                };
                members.push(format!("{}: {}", syntax::node_text(key, source), infer_or_any(value, source)));
            }
            SyntaxKind::ShorthandPropertyIdentifier => {
                members.push(format!("{}: {}", syntax::node_text(member, source), UNKNOWN));
            }
            SyntaxKind::MethodDefinition => {
                if let Some(name) = member.child_by_field_name("name") {
                    members.push(format!("{}: {}", syntax::node_text(name, source), function_type(member, source)));
                }
            }
            _ => {}
        }
    }
    if members.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", members.join("; "))
    }
}

/// `(a: number, b: any) => string` for a function-like node.
pub fn function_type(node: Node, source: &str) -> String {
    let params: Vec<String> = syntax::parameters_of(node)
        .unwrap_or_default()
        .into_iter()
        .map(|p| parameter_signature(p, source))
        .collect();
    let ret = declared_return_type(node, source)
        .or_else(|| infer_return_type(node, source))
        .unwrap_or_else(|| UNKNOWN.to_string());
    format!("({}) => {}", params.join(", "), ret)
}

fn parameter_signature(param: Node, source: &str) -> String {
    if SyntaxKind::of(param) == SyntaxKind::Identifier {
        return format!("{}: {}", syntax::node_text(param, source), UNKNOWN);
    }
    let name = param
        .child_by_field_name("pattern")
        .map(|p| syntax::node_text(p, source))
        .unwrap_or("arg");
    let optional = if SyntaxKind::of(param) == SyntaxKind::OptionalParameter { "?" } else { "" };
    let ty = declared_type(param, source)
        .or_else(|| param.child_by_field_name("value").and_then(|v| infer_expression(v, source)))
        .unwrap_or_else(|| UNKNOWN.to_string());
    format!("{}{}: {}", name, optional, ty)
}

/// Text of a `: T` annotation on a declaration, without the colon.
pub fn declared_type(node: Node, source: &str) -> Option<String> {
    let annotation = node
        .child_by_field_name("type")
        .or_else(|| syntax::child_of_kind(node, SyntaxKind::TypeAnnotation))?;
    Some(annotation_text(annotation, source))
}

pub fn declared_return_type(node: Node, source: &str) -> Option<String> {
    let annotation = node.child_by_field_name("return_type")?;
    Some(annotation_text(annotation, source))
}

fn annotation_text(annotation: Node, source: &str) -> String {
    syntax::node_text(annotation, source)
        .trim_start_matches(':')
        .trim()
        .to_string()
}

/// Union of the types of `return` expressions in a function body (nested
/// functions excluded); `void` when there are none.
pub fn infer_return_type(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    if SyntaxKind::of(body) != SyntaxKind::StatementBlock {
        // Expression-bodied arrow function.
        return infer_expression(body, source);
    }
    let mut returns = Vec::new();
    collect_returns(body, &mut returns);
    if returns.is_empty() {
        return Some("void".to_string());
    }
    let types: Option<Vec<String>> = returns
        .into_iter()
        .map(|r| match syntax::named_children(r).first() {
            Some(value) => infer_expression(*value, source),
            None => Some("void".to_string()),
        })
        .collect();
    union(types?)
}

fn collect_returns<'tree>(node: Node<'tree>, out: &mut Vec<Node<'tree>>) {
    for child in syntax::named_children(node) {
        let kind = SyntaxKind::of(child);
        if kind.is_function_like() || kind == SyntaxKind::ClassDeclaration {
            continue;
        }
        if child.kind() == "return_statement" {
            out.push(child);
        } else {
            collect_returns(child, out);
        }
    }
}

fn operator(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("operator")
        .map(|op| syntax::node_text(op, source).to_string())
}

fn infer_binary(node: Node, source: &str) -> Option<String> {
    let op = operator(node, source)?;
    let left = node.child_by_field_name("left").and_then(|l| infer_expression(l, source));
    let right = node.child_by_field_name("right").and_then(|r| infer_expression(r, source));
    match op.as_str() {
        "-" | "*" | "/" | "%" | "**" | "&" | "|" | "^" | "<<" | ">>" | ">>>" => Some("number".to_string()),
        "==" | "!=" | "===" | "!==" | "<" | ">" | "<=" | ">=" | "instanceof" | "in" => Some("boolean".to_string()),
        "+" => match (left.as_deref(), right.as_deref()) {
            (Some("string"), _) | (_, Some("string")) => Some("string".to_string()),
            (Some("number"), Some("number")) => Some("number".to_string()),
            _ => None,
        },
        "&&" | "||" | "??" => match (left, right) {
            (Some(l), Some(r)) if l == r => Some(l),
            (_, r) => r,
        },
        _ => None,
    }
}

fn infer_unary(node: Node, source: &str) -> Option<String> {
    match operator(node, source)?.as_str() {
        "!" | "delete" => Some("boolean".to_string()),
        "-" | "+" | "~" => Some("number".to_string()),
        "typeof" => Some("string".to_string()),
        "void" => Some("undefined".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceFile;

    fn infer_initializer(source: &str) -> Option<String> {
        let file = SourceFile::parse("/p/a.ts", source).unwrap();
        let decl = &file.declarations[0];
        let node = crate::locator::find_exact(file.root(), decl.range.clone(), None).unwrap();
        let value = node.child_by_field_name("value").unwrap();
        infer_expression(value, &file.text)
    }

    #[test]
    fn test_literals_are_widened() {
        assert_eq!(infer_initializer("const a = 1").as_deref(), Some("number"));
        assert_eq!(infer_initializer("const a = 'x'").as_deref(), Some("string"));
        assert_eq!(infer_initializer("const a = `x${1}`").as_deref(), Some("string"));
        assert_eq!(infer_initializer("const a = false").as_deref(), Some("boolean"));
        assert_eq!(infer_initializer("const a = /x/g").as_deref(), Some("RegExp"));
    }

    #[test]
    fn test_composite_expressions() {
        assert_eq!(infer_initializer("const a = [1, 2]").as_deref(), Some("number[]"));
        assert_eq!(infer_initializer("const a = [1, 'x']").as_deref(), Some("(number | string)[]"));
        assert_eq!(infer_initializer("const a = []").as_deref(), Some("any[]"));
        assert_eq!(
            infer_initializer("const a = { x: 1, y: [true] }").as_deref(),
            Some("{ x: number; y: boolean[] }")
        );
        assert_eq!(infer_initializer("const a = new Date()").as_deref(), Some("Date"));
        assert_eq!(infer_initializer("const a = 1 + 'x'").as_deref(), Some("string"));
        assert_eq!(infer_initializer("const a = 2 * 3 > 4").as_deref(), Some("boolean"));
        assert_eq!(infer_initializer("const a = foo()"), None);
    }

    #[test]
    fn test_function_types() {
        assert_eq!(
            infer_initializer("const a = (x: number, y = 'k') => x > 1").as_deref(),
            Some("(x: number, y: string) => boolean")
        );
        assert_eq!(
            infer_initializer("const a = function (b) { if (b) { return 1 } return 2 }").as_deref(),
            Some("(b: any) => number")
        );
        assert_eq!(
            infer_initializer("const a = () => { const f = () => 'x' }").as_deref(),
            Some("() => void")
        );
    }
}
