//! Edit Builder: position-accurate text edits against an immutable snapshot.
//!
//! Every offset is a byte offset into the text of the snapshot the edit was
//! computed from. Edits are never applied to the snapshot; they are either
//! handed to the client as a `WorkspaceEdit` or applied in memory with
//! [`apply_edits`] to stage an intermediate text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tower_lsp::lsp_types::{
    self, CreateFile, CreateFileOptions, DocumentChangeOperation, DocumentChanges, OneOf,
    OptionalVersionedTextDocumentIdentifier, RenameFile, RenameFileOptions, ResourceOp,
    TextDocumentEdit, Url, WorkspaceEdit,
};
use tree_sitter::Node;

use crate::document::LineIndex;
use crate::error::{RefactorError, Result};
use crate::program::Program;
use crate::syntax::{self, SyntaxKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub length: usize,
}

impl Span {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn from_range(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start,
            length: range.end.saturating_sub(range.start),
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub file: PathBuf,
    pub span: Span,
    pub new_text: String,
}

/// Replace `length` bytes at `start` with `new_text`.
pub fn build(file: &Path, new_text: impl Into<String>, start: usize, length: usize) -> TextEdit {
    TextEdit {
        file: file.to_path_buf(),
        span: Span::new(start, length),
        new_text: new_text.into(),
    }
}

pub fn insert(file: &Path, new_text: impl Into<String>, start: usize) -> TextEdit {
    build(file, new_text, start, 0)
}

pub fn delete(file: &Path, range: std::ops::Range<usize>) -> TextEdit {
    build(file, "", range.start, range.end.saturating_sub(range.start))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Create { path: PathBuf, text: String },
    Rename { from: PathBuf, to: PathBuf },
}

/// The edits and file operations produced by one refactor operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBatch {
    edits: Vec<TextEdit>,
    file_operations: Vec<FileOperation>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: TextEdit) {
        self.edits.push(edit);
    }

    pub fn extend(&mut self, edits: impl IntoIterator<Item = TextEdit>) {
        self.edits.extend(edits);
    }

    pub fn append(&mut self, other: EditBatch) {
        self.edits.extend(other.edits);
        self.file_operations.extend(other.file_operations);
    }

    pub fn create_file(&mut self, path: PathBuf, text: String) {
        self.file_operations.push(FileOperation::Create { path, text });
    }

    pub fn rename_file(&mut self, from: PathBuf, to: PathBuf) {
        self.file_operations.push(FileOperation::Rename { from, to });
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn into_edits(self) -> Vec<TextEdit> {
        self.edits
    }

    pub fn file_operations(&self) -> &[FileOperation] {
        &self.file_operations
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.file_operations.is_empty()
    }

    /// Files touched by text edits, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.edits.iter().map(|e| e.file.clone()).collect();
        files.sort();
        files.dedup();
        files
    }

    /// Edits for one file, ordered by start; equal starts keep push order.
    pub fn edits_for(&self, file: &Path) -> Vec<&TextEdit> {
        let mut edits: Vec<&TextEdit> = self.edits.iter().filter(|e| e.file == file).collect();
        edits.sort_by_key(|e| edit_order(e));
        edits
    }

    fn created_text(&self, file: &Path) -> Option<&str> {
        self.file_operations.iter().find_map(|op| match op {
            FileOperation::Create { path, text } if path == file => Some(text.as_str()),
            _ => None,
        })
    }

    /// Every span lies within its file and no two spans of one file overlap.
    pub fn validate(&self, program: &Program) -> Result<()> {
        for file in self.files() {
            let len = match program.file(&file) {
                Some(source) => source.text.len(),
                None => match self.created_text(&file) {
                    Some(text) => text.len(),
                    None => {
                        return Err(RefactorError::EditConflict {
                            file,
                            reason: "file is not part of the program".to_string(),
                        })
                    }
                },
            };
            check_spans(&file, len, &self.edits_for(&file))?;
        }
        Ok(())
    }

    /// Resulting text of every edited or created file, renames ignored.
    pub fn apply(&self, program: &Program) -> Result<BTreeMap<PathBuf, String>> {
        let mut out = BTreeMap::new();
        for op in &self.file_operations {
            if let FileOperation::Create { path, text } = op {
                out.insert(path.clone(), text.clone());
            }
        }
        for file in self.files() {
            let base = match program.file(&file) {
                Some(source) => source.text.clone(),
                None => out.get(&file).cloned().unwrap_or_default(),
            };
            let text = apply_edits(&file, &base, &self.edits)?;
            out.insert(file, text);
        }
        Ok(out)
    }

    /// Converts to an LSP edit: file creations, then text edits, then renames.
    pub fn into_workspace_edit(self, program: &Program) -> Result<WorkspaceEdit> {
        self.validate(program)?;
        let mut operations = Vec::new();
        for op in &self.file_operations {
            if let FileOperation::Create { path, text } = op {
                operations.push(DocumentChangeOperation::Op(ResourceOp::Create(CreateFile {
                    uri: file_url(path)?,
                    options: Some(CreateFileOptions {
                        overwrite: Some(false),
                        ignore_if_exists: Some(true),
                    }),
                    annotation_id: None,
                })));
                // A created file starts empty; its content is one insertion.
                operations.push(DocumentChangeOperation::Edit(TextDocumentEdit {
                    text_document: OptionalVersionedTextDocumentIdentifier {
                        uri: file_url(path)?,
                        version: None,
                    },
                    edits: vec![OneOf::Left(lsp_types::TextEdit {
                        range: lsp_types::Range::default(),
                        new_text: text.clone(),
                    })],
                }));
            }
        }

        let mut by_file: BTreeMap<PathBuf, Vec<&TextEdit>> = BTreeMap::new();
        for edit in &self.edits {
            by_file.entry(edit.file.clone()).or_default().push(edit);
        }
        for (file, mut edits) in by_file {
            edits.sort_by_key(|e| edit_order(e));
            let (text, index) = match program.file(&file) {
                Some(source) => (source.text.as_str(), source.line_index.clone()),
                None => {
                    let text = self.created_text(&file).unwrap_or_default();
                    (text, LineIndex::new(text))
                }
            };
            let lsp_edits = edits
                .iter()
                .map(|edit| {
                    OneOf::Left(lsp_types::TextEdit {
                        range: lsp_types::Range::new(
                            index.offset_to_position(text, edit.span.start),
                            index.offset_to_position(text, edit.span.end()),
                        ),
                        new_text: edit.new_text.clone(),
                    })
                })
                .collect();
            operations.push(DocumentChangeOperation::Edit(TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    uri: file_url(&file)?,
                    version: None,
                },
                edits: lsp_edits,
            }));
        }

        for op in &self.file_operations {
            if let FileOperation::Rename { from, to } = op {
                operations.push(DocumentChangeOperation::Op(ResourceOp::Rename(RenameFile {
                    old_uri: file_url(from)?,
                    new_uri: file_url(to)?,
                    options: Some(RenameFileOptions {
                        overwrite: Some(false),
                        ignore_if_exists: Some(false),
                    }),
                    annotation_id: None,
                })));
            }
        }

        Ok(WorkspaceEdit {
            document_changes: Some(DocumentChanges::Operations(operations)),
            ..Default::default()
        })
    }
}

fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|_| RefactorError::resolution(format!("file URI for {}", path.display())))
}

/// Start offset, with insertions ahead of replacements starting there.
fn edit_order(edit: &TextEdit) -> (usize, bool) {
    (edit.span.start, edit.span.length > 0)
}

fn check_spans(file: &Path, len: usize, sorted: &[&TextEdit]) -> Result<()> {
    let mut cursor = 0usize;
    for edit in sorted {
        if edit.span.end() > len {
            return Err(RefactorError::EditConflict {
                file: file.to_path_buf(),
                reason: format!("span {}..{} exceeds length {}", edit.span.start, edit.span.end(), len),
            });
        }
        if edit.span.start < cursor {
            return Err(RefactorError::EditConflict {
                file: file.to_path_buf(),
                reason: format!("span {}..{} overlaps a previous edit", edit.span.start, edit.span.end()),
            });
        }
        cursor = edit.span.end();
    }
    Ok(())
}

/// Applies edits of a single file to `text` in memory.
pub fn apply_edits(file: &Path, text: &str, edits: &[TextEdit]) -> Result<String> {
    let mut sorted: Vec<&TextEdit> = edits.iter().filter(|e| e.file == file).collect();
    sorted.sort_by_key(|e| edit_order(e));
    check_spans(file, text.len(), &sorted)?;

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for edit in sorted {
        if !text.is_char_boundary(edit.span.start) || !text.is_char_boundary(edit.span.end()) {
            return Err(RefactorError::EditConflict {
                file: file.to_path_buf(),
                reason: format!("span {}..{} splits a character", edit.span.start, edit.span.end()),
            });
        }
        out.push_str(&text[cursor..edit.span.start]);
        out.push_str(&edit.new_text);
        cursor = edit.span.end();
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

/// A single edit turning `old` into `new`, covering only the differing middle.
pub fn replace_minimal(file: &Path, old: &str, new: &str) -> Option<TextEdit> {
    if old == new {
        return None;
    }
    let prefix = old
        .char_indices()
        .zip(new.chars())
        .find(|((_, a), b)| a != b)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| old.len().min(new.len()));
    // Keep the prefix on a boundary valid for both strings.
    let mut prefix = prefix;
    while !new.is_char_boundary(prefix) || !old.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let max_suffix = old.len().min(new.len()) - prefix;
    let mut suffix = old
        .bytes()
        .rev()
        .zip(new.bytes().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix) {
        suffix -= 1;
    }

    Some(build(
        file,
        &new[prefix..new.len() - suffix],
        prefix,
        old.len() - suffix - prefix,
    ))
}

/// Where a new member goes in a class/interface/object body: after the last
/// member, or right after `{` when the body is empty.
pub fn member_insertion_point(body: Node) -> usize {
    let members: Vec<Node> = syntax::named_children(body);
    if let Some(last) = members.last() {
        // Include a trailing `;` or `,` separator owned by the body.
        let mut end = last.end_byte();
        if let Some(next) = last.next_sibling() {
            if !next.is_named() && matches!(next.kind(), ";" | ",") {
                end = next.end_byte();
            }
        }
        return end;
    }
    syntax::children(body)
        .into_iter()
        .find(|child| child.kind() == "{")
        .map(|brace| brace.end_byte())
        .unwrap_or_else(|| body.start_byte())
}

/// Widens a statement span to whole lines when nothing else shares them, so
/// deleting it does not leave a blank line behind.
pub fn line_extent(text: &str, range: std::ops::Range<usize>) -> std::ops::Range<usize> {
    let line_start = text[..range.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let start = if text[line_start..range.start].trim().is_empty() {
        line_start
    } else {
        range.start
    };
    let rest = &text[range.end..];
    let trailing = rest.len() - rest.trim_start_matches([' ', '\t', ';']).len();
    let mut end = range.end + trailing;
    if text[end..].starts_with("\r\n") {
        end += 2;
    } else if text[end..].starts_with('\n') {
        end += 1;
    } else if end < text.len() {
        // Something else follows on the same line; only drop the statement.
        return range;
    }
    start..end
}

/// Indentation of the line containing `offset`.
pub fn indentation_at(text: &str, offset: usize) -> &str {
    let line_start = text[..offset.min(text.len())].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &text[line_start..];
    let width = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    &rest[..width]
}

/// Indentation for members of `body`: that of the first member, or the
/// container's indentation plus four spaces.
pub fn member_indentation(text: &str, body: Node) -> String {
    if let Some(first) = syntax::named_children(body).first() {
        return indentation_at(text, first.start_byte()).to_string();
    }
    let container = body.parent().unwrap_or(body);
    format!("{}    ", indentation_at(text, container.start_byte()))
}

/// Whether `body` is written on a single line (`{ a: 1 }`).
pub fn is_single_line(body: Node) -> bool {
    body.start_position().row == body.end_position().row
}

/// The kind of container a member is being added to.
pub fn member_separator(body: Node) -> &'static str {
    match SyntaxKind::of(body) {
        SyntaxKind::Object => ",",
        SyntaxKind::InterfaceBody | SyntaxKind::ObjectType => ";",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceFile;
    use crate::locator;

    fn path() -> PathBuf {
        PathBuf::from("/p/a.ts")
    }

    #[test]
    fn test_apply_edits_preserves_push_order_at_same_offset() {
        let p = path();
        let edits = vec![
            insert(&p, "A", 3),
            insert(&p, "B", 3),
            build(&p, "xy", 0, 1),
        ];
        assert_eq!(apply_edits(&p, "abcdef", &edits).unwrap(), "xybcABdef");
    }

    #[test]
    fn test_insert_and_replace_at_same_start() {
        let p = path();
        let replace_first = vec![build(&p, "X", 2, 2), insert(&p, "ins", 2)];
        let insert_first = vec![insert(&p, "ins", 2), build(&p, "X", 2, 2)];
        assert_eq!(apply_edits(&p, "abcdef", &replace_first).unwrap(), "abinsXef");
        assert_eq!(apply_edits(&p, "abcdef", &insert_first).unwrap(), "abinsXef");
    }

    #[test]
    fn test_overlapping_edits_conflict() {
        let p = path();
        let edits = vec![build(&p, "1", 0, 3), build(&p, "2", 2, 2)];
        let err = apply_edits(&p, "abcdef", &edits).unwrap_err();
        assert!(matches!(err, RefactorError::EditConflict { .. }));
    }

    #[test]
    fn test_out_of_bounds_edit_conflicts() {
        let p = path();
        let err = apply_edits(&p, "abc", &[build(&p, "x", 2, 5)]).unwrap_err();
        assert!(matches!(err, RefactorError::EditConflict { .. }));
    }

    #[test]
    fn test_replace_minimal_trims_common_prefix_and_suffix() {
        let p = path();
        let old = "import { a } from './x';\nfoo();\n";
        let new = "import { a, b } from './x';\nfoo();\n";
        let edit = replace_minimal(&p, old, new).unwrap();
        assert_eq!(edit.span, Span::new(10, 0));
        assert_eq!(edit.new_text, ", b");
        assert_eq!(apply_edits(&p, old, &[edit]).unwrap(), new);
        assert!(replace_minimal(&p, old, old).is_none());
    }

    #[test]
    fn test_replace_minimal_repeated_characters() {
        let p = path();
        let edit = replace_minimal(&p, "aaa", "aa").unwrap();
        assert_eq!(apply_edits(&p, "aaa", &[edit]).unwrap(), "aa");
        let edit = replace_minimal(&p, "é", "è").unwrap();
        assert_eq!(apply_edits(&p, "é", &[edit]).unwrap(), "è");
    }

    #[test]
    fn test_line_extent() {
        let text = "import a from 'a'\n  import b from 'b';\nfoo(); bar();\n";
        let b = text.find("import b").unwrap();
        let b_end = text.find(';').unwrap();
        assert_eq!(&text[line_extent(text, b..b_end)], "  import b from 'b';\n");
        let foo = text.find("foo").unwrap();
        assert_eq!(line_extent(text, foo..foo + 6), foo..foo + 6);
        let last = "x\ny";
        assert_eq!(&last[line_extent(last, 2..3)], "y");
    }

    #[test]
    fn test_member_insertion_point() {
        let file = SourceFile::parse("/p/a.ts", "class A {\n    x = 1;\n}\nclass B {}\n").unwrap();
        let bodies: Vec<_> = file
            .declarations
            .iter()
            .map(|d| {
                let node = locator::find_exact(file.root(), d.range.clone(), None).unwrap();
                node.child_by_field_name("body").unwrap()
            })
            .collect();
        let a = member_insertion_point(bodies[0]);
        assert_eq!(&file.text[..a], "class A {\n    x = 1;");
        let b = member_insertion_point(bodies[1]);
        assert_eq!(&file.text[..b], "class A {\n    x = 1;\n}\nclass B {");
        assert_eq!(member_indentation(&file.text, bodies[0]), "    ");
        assert_eq!(member_indentation(&file.text, bodies[1]), "    ");
    }

    #[test]
    fn test_workspace_edit_converts_to_utf16_positions() {
        let program = Program::from_sources(vec![("/p/a.ts".into(), "const s = '😀'; s\n".to_string())]);
        let text = &program.file(Path::new("/p/a.ts")).unwrap().text;
        let offset = text.rfind('s').unwrap();
        let mut batch = EditBatch::new();
        batch.push(build(Path::new("/p/a.ts"), "t", offset, 1));
        let edit = batch.into_workspace_edit(&program).unwrap();
        let Some(DocumentChanges::Operations(ops)) = edit.document_changes else {
            panic!("expected operations");
        };
        let DocumentChangeOperation::Edit(doc_edit) = &ops[0] else {
            panic!("expected a text edit");
        };
        let OneOf::Left(first) = &doc_edit.edits[0] else {
            panic!("expected a plain edit");
        };
        // The emoji counts as two UTF-16 units.
        assert_eq!(first.range.start, lsp_types::Position::new(0, 16));
    }
}
