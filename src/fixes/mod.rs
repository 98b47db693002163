//! Built-in code fixes and refactors offered through the registry.

use tree_sitter::Node;

use crate::document::SourceFile;
use crate::edits::{self, TextEdit};
use crate::locator;
use crate::program::{Program, SymbolId};
use crate::syntax::{self, DeclarationKind, SyntaxKind};

mod add_type;
mod const_to_let;
mod declare_constructor;
mod declare_member;
mod implement_interface;
mod move_declaration;
mod move_file;
mod reorder_params;

pub use add_type::AddType;
pub use const_to_let::ConstToLet;
pub use declare_constructor::DeclareConstructor;
pub use declare_member::DeclareMember;
pub use implement_interface::ImplementInterface;
pub use move_declaration::MoveDeclaration;
pub use move_file::MoveFile;
pub use reorder_params::ReorderParams;

/// The class or interface node a resolved symbol was declared by.
pub(crate) fn type_container<'p>(program: &'p Program, symbol: &SymbolId) -> Option<(&'p SourceFile, Node<'p>)> {
    let decl = program
        .declarations_of(symbol)
        .into_iter()
        .find(|d| matches!(d.kind, DeclarationKind::Class | DeclarationKind::Interface))?;
    let file = program.file(&symbol.file)?;
    let leaf = locator::find_containing(file.root(), decl.range.clone())?;
    let node = locator::find_ascendant(leaf, |n| n.byte_range() == decl.range, true)?;
    Some((file, node))
}

/// Inserts `member` into a class, interface or object literal body, indented
/// like its siblings. `at_start` puts it right after the opening brace.
pub(crate) fn insert_member(file: &SourceFile, body: Node, member: &str, at_start: bool) -> TextEdit {
    let text = file.text.as_str();
    let indent = edits::member_indentation(text, body);
    let container = body.parent().unwrap_or(body);
    let outer = edits::indentation_at(text, container.start_byte());
    let member = member.lines().collect::<Vec<_>>().join(&format!("\n{}", indent));
    let brace_end = syntax::children(body)
        .into_iter()
        .find(|c| c.kind() == "{")
        .map(|b| b.end_byte())
        .unwrap_or_else(|| body.start_byte());
    let single_line = edits::is_single_line(body);

    if syntax::named_children(body).is_empty() {
        let new_text = if single_line {
            format!("\n{}{}\n{}", indent, member, outer)
        } else {
            format!("\n{}{}", indent, member)
        };
        return edits::insert(&file.path, new_text, brace_end);
    }
    if at_start {
        return edits::insert(&file.path, format!("\n{}{}", indent, member), brace_end);
    }

    let point = edits::member_insertion_point(body);
    let separated = text[..point].trim_end().ends_with([',', ';']);
    let separator = match SyntaxKind::of(body) {
        SyntaxKind::Object if !separated => ",",
        SyntaxKind::InterfaceBody | SyntaxKind::ObjectType if single_line && !separated => ";",
        _ => "",
    };
    let new_text = if single_line {
        format!("{} {}", separator, member)
    } else {
        format!("{}\n{}{}", separator, indent, member)
    };
    edits::insert(&file.path, new_text, point)
}

/// Capitalized first letter, for generated parameter names.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn body_of<'a>(file: &'a SourceFile, needle: &str) -> Node<'a> {
        let at = file.text.find(needle).unwrap();
        let leaf = locator::find_containing(file.root(), at..at).unwrap();
        locator::find_ascendant(
            leaf,
            |n| {
                matches!(
                    SyntaxKind::of(n),
                    SyntaxKind::ClassBody | SyntaxKind::InterfaceBody | SyntaxKind::ObjectType | SyntaxKind::Object
                )
            },
            true,
        )
        .unwrap()
    }

    fn apply(file: &SourceFile, edit: TextEdit) -> String {
        edits::apply_edits(&file.path, &file.text, &[edit]).unwrap()
    }

    #[test]
    fn test_insert_member_into_bodies() {
        let file = SourceFile::parse(
            PathBuf::from("/p/a.ts"),
            "class A {}\ninterface I {\n  a: string\n}\nconst o = { a: 1 }\n",
        )
        .unwrap();

        let class = body_of(&file, "{}");
        assert_eq!(
            apply(&file, insert_member(&file, class, "x: number;", false)),
            "class A {\n    x: number;\n}\ninterface I {\n  a: string\n}\nconst o = { a: 1 }\n"
        );

        let iface = body_of(&file, "a: string");
        assert_eq!(
            apply(&file, insert_member(&file, iface, "b: boolean;", false)),
            "class A {}\ninterface I {\n  a: string\n  b: boolean;\n}\nconst o = { a: 1 }\n"
        );

        let object = body_of(&file, "a: 1");
        assert_eq!(
            apply(&file, insert_member(&file, object, "b: null", false)),
            "class A {}\ninterface I {\n  a: string\n}\nconst o = { a: 1, b: null }\n"
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("string"), "String");
        assert_eq!(capitalize(""), "");
    }
}
