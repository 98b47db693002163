use std::path::Path;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::document::Declaration;
use crate::syntax::{self, DeclarationKind, SyntaxKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
}

fn language(dialect: Dialect) -> Language {
    match dialect {
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Parses TypeScript sources and extracts their top-level declarations.
///
/// `tree_sitter::Parser` is not `Sync`, so a fresh parser is created per call.
pub struct TsParser;

impl TsParser {
    pub fn new() -> Self {
        Self
    }

    pub fn dialect_for(path: &Path) -> Dialect {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => Dialect::Tsx,
            _ => Dialect::TypeScript,
        }
    }

    pub fn parse(&self, source: &str, dialect: Dialect) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&language(dialect)).ok()?;
        parser.parse(source, None)
    }

    pub fn extract_declarations(&self, tree: &Tree, source: &str) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        let root = tree.root_node();
        for statement in syntax::named_children(root) {
            self.walk_statement(statement, statement, false, false, source, &mut declarations);
        }
        declarations
    }

    fn walk_statement(
        &self,
        node: Node,
        statement: Node,
        exported: bool,
        default_export: bool,
        source: &str,
        out: &mut Vec<Declaration>,
    ) {
        match SyntaxKind::of(node) {
            SyntaxKind::ExportStatement => {
                let is_default = syntax::has_token(node, "default");
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.walk_statement(decl, statement, true, is_default, source, out);
                } else if let Some(value) = node.child_by_field_name("value") {
                    // `export default function named() {}` may surface as an expression.
                    let kind = match value.kind() {
                        "function_expression" | "function" => Some(DeclarationKind::Function),
                        "class" => Some(DeclarationKind::Class),
                        _ => None,
                    };
                    if let (Some(kind), Some(name)) = (kind, value.child_by_field_name("name")) {
                        out.push(Declaration {
                            name: syntax::node_text(name, source).to_string(),
                            kind,
                            range: value.byte_range(),
                            statement_range: statement.byte_range(),
                            name_range: name.byte_range(),
                            exported: true,
                            default_export: is_default,
                        });
                    }
                }
            }
            SyntaxKind::AmbientDeclaration => {
                for child in syntax::named_children(node) {
                    self.walk_statement(child, statement, exported, default_export, source, out);
                }
            }
            SyntaxKind::LexicalDeclaration | SyntaxKind::VariableDeclaration => {
                for declarator in syntax::named_children(node) {
                    if SyntaxKind::of(declarator) != SyntaxKind::VariableDeclarator {
                        continue;
                    }
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    // Destructuring patterns do not declare a single name.
                    if SyntaxKind::of(name) != SyntaxKind::Identifier {
                        continue;
                    }
                    out.push(Declaration {
                        name: syntax::node_text(name, source).to_string(),
                        kind: DeclarationKind::Variable,
                        range: declarator.byte_range(),
                        statement_range: statement.byte_range(),
                        name_range: name.byte_range(),
                        exported,
                        default_export,
                    });
                }
            }
            kind => {
                let Some(decl_kind) = DeclarationKind::from_syntax(kind) else {
                    return;
                };
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                out.push(Declaration {
                    name: syntax::node_text(name, source).to_string(),
                    kind: decl_kind,
                    range: node.byte_range(),
                    statement_range: statement.byte_range(),
                    name_range: name.byte_range(),
                    exported,
                    default_export,
                });
            }
        }
    }
}

impl Default for TsParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations(source: &str) -> Vec<Declaration> {
        let parser = TsParser::new();
        let tree = parser.parse(source, Dialect::TypeScript).unwrap();
        parser.extract_declarations(&tree, source)
    }

    #[test]
    fn test_extracts_all_declaration_kinds() {
        let decls = declarations(
            r#"
function f(a: number) {}
export class Animal {}
interface Shape { area(): number }
type Id = string
enum Color { Red }
export const x = 1, y = 2
"#,
        );
        let summary: Vec<_> = decls.iter().map(|d| (d.name.as_str(), d.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("f", DeclarationKind::Function),
                ("Animal", DeclarationKind::Class),
                ("Shape", DeclarationKind::Interface),
                ("Id", DeclarationKind::TypeAlias),
                ("Color", DeclarationKind::Enum),
                ("x", DeclarationKind::Variable),
                ("y", DeclarationKind::Variable),
            ]
        );
        assert!(decls[1].exported);
        assert!(decls[5].exported && decls[6].exported);
    }

    #[test]
    fn test_statement_range_covers_export_keyword() {
        let source = "export default function main() {}\n";
        let decls = declarations(source);
        assert_eq!(decls.len(), 1);
        assert!(decls[0].default_export);
        assert_eq!(decls[0].statement_range.start, 0);
        assert_eq!(&source[decls[0].range.clone()], "function main() {}");
        assert_eq!(&source[decls[0].name_range.clone()], "main");
    }

    #[test]
    fn test_overload_signatures_are_declarations() {
        let decls = declarations("function g(a: string): void\nfunction g(a: any) {}\n");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].kind, DeclarationKind::FunctionOverload);
        assert_eq!(decls[1].kind, DeclarationKind::Function);
    }
}
