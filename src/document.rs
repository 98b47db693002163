use std::ops::Range;
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::{Position, Url};
use tree_sitter::{Node, Tree};

use crate::parser::TsParser;
use crate::syntax::DeclarationKind;

/// A top-level declaration of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Span of the declaration node itself (`function f() {}`).
    pub range: Range<usize>,
    /// Span of the whole statement, including an `export` wrapper when present.
    pub statement_range: Range<usize>,
    pub name_range: Range<usize>,
    pub exported: bool,
    pub default_export: bool,
}

impl Declaration {
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.statement_range.start <= offset && offset <= self.statement_range.end
    }
}

/// Byte offset <-> LSP position conversion for one snapshot of a text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Columns are counted in UTF-16 code units, as LSP requires.
    pub fn offset_to_position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let col: usize = text[line_start..offset].chars().map(char::len_utf16).sum();
        Position::new(line as u32, col as u32)
    }

    /// Clamps out-of-range positions to the end of the line or text.
    pub fn position_to_offset(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        let Some(&line_start) = self.line_starts.get(line) else {
            return text.len();
        };
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        let mut units = 0usize;
        for (i, c) in text[line_start..line_end].char_indices() {
            if units >= position.character as usize {
                return line_start + i;
            }
            units += c.len_utf16();
        }
        line_end
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Immutable parsed snapshot of one TypeScript file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub tree: Tree,
    pub line_index: LineIndex,
    pub declarations: Vec<Declaration>,
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Option<Self> {
        let path = path.into();
        let text = text.into();
        let parser = TsParser::new();
        let tree = parser.parse(&text, TsParser::dialect_for(&path))?;
        let declarations = parser.extract_declarations(&tree, &text);
        let line_index = LineIndex::new(&text);
        Some(Self {
            path,
            text,
            tree,
            line_index,
            declarations,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text(&self, node: Node) -> &str {
        &self.text[node.byte_range()]
    }

    pub fn uri(&self) -> Option<Url> {
        Url::from_file_path(&self.path).ok()
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn offset_to_position(&self, offset: usize) -> Position {
        self.line_index.offset_to_position(&self.text, offset)
    }

    pub fn position_to_offset(&self, position: Position) -> usize {
        self.line_index.position_to_offset(&self.text, position)
    }

    /// Declarations with the given top-level name.
    pub fn declarations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Declaration> + 'a {
        self.declarations.iter().filter(move |d| d.name == name)
    }

    pub fn declaration_at(&self, offset: usize) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.contains_offset(offset))
    }

    pub fn has_default_export(&self) -> bool {
        crate::program::has_default_export(self)
    }
}

/// An editor buffer the client has opened.
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: Url,
    pub text: String,
    pub version: i32,
}

impl Document {
    pub fn new(uri: Url, text: String, version: i32) -> Self {
        Self { uri, text, version }
    }

    pub fn get_line(&self, line: u32) -> Option<&str> {
        self.text.lines().nth(line as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_round_trips_utf16_columns() {
        let text = "const a = 'é';\nconst 😀 = 1;\nlast";
        let index = LineIndex::new(text);
        let offset = text.find("last").unwrap();
        let pos = index.offset_to_position(text, offset);
        assert_eq!(pos, Position::new(2, 0));
        assert_eq!(index.position_to_offset(text, pos), offset);

        // The emoji occupies two UTF-16 units.
        let eq = text.find("= 1").unwrap();
        let pos = index.offset_to_position(text, eq);
        assert_eq!(pos, Position::new(1, 9));
        assert_eq!(index.position_to_offset(text, pos), eq);
    }

    #[test]
    fn test_position_past_end_is_clamped() {
        let text = "ab\ncd";
        let index = LineIndex::new(text);
        assert_eq!(index.position_to_offset(text, Position::new(0, 99)), 2);
        assert_eq!(index.position_to_offset(text, Position::new(9, 0)), text.len());
        assert_eq!(index.position_to_offset(text, Position::new(u32::MAX, u32::MAX)), text.len());
        assert_eq!(index.offset_to_position(text, 999), Position::new(1, 2));
    }

    #[test]
    fn test_source_file_collects_declarations() {
        let file = SourceFile::parse(
            "/p/a.ts",
            "export default function f1() {}\ninterface I {}\nexport class C {}\n",
        )
        .unwrap();
        let names: Vec<_> = file.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["f1", "I", "C"]);
        assert!(file.declarations[0].default_export);
        assert!(!file.declarations[1].exported);
        assert!(file.declarations[2].exported);
        assert!(file.has_default_export());
    }
}
