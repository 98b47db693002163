//! Parameter/Argument Reorder Engine.
//!
//! A permutation `[1, 0]` moves the first parameter to position 1 and the
//! second to position 0. Parameters not named by the permutation keep their
//! relative order and fill the lowest free positions.

use tree_sitter::Node;

use crate::document::SourceFile;
use crate::edits::{self, EditBatch};
use crate::error::{RefactorError, Result};
use crate::locator;
use crate::program::{Program, SymbolId};
use crate::references::{self, ReferenceSite};
use crate::syntax::{self, SyntaxKind};

/// Original index -> new index for one parameter list length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    permutation: Vec<usize>,
    targets: Vec<usize>,
}

impl ParameterMapping {
    pub fn new(permutation: &[usize], count: usize) -> Result<Self> {
        let invalid = |reason: String| RefactorError::InvalidPermutation {
            permutation: permutation.to_vec(),
            count,
            reason,
        };
        if permutation.len() > count {
            return Err(invalid(format!("{} entries for {} parameters", permutation.len(), count)));
        }
        let mut occupied = vec![false; count];
        for &slot in permutation {
            if slot >= count {
                return Err(invalid(format!("position {} is out of range", slot)));
            }
            if occupied[slot] {
                return Err(invalid(format!("position {} is used twice", slot)));
            }
            occupied[slot] = true;
        }

        let mut targets = permutation.to_vec();
        for _ in permutation.len()..count {
            // Cannot fail: exactly `count - permutation.len()` slots are free.
            let free = occupied.iter().position(|o| !o).unwrap_or(count - 1);
            occupied[free] = true;
            targets.push(free);
        }
        Ok(Self {
            permutation: permutation.to_vec(),
            targets,
        })
    }

    pub fn count(&self) -> usize {
        self.targets.len()
    }

    pub fn target(&self, original: usize) -> usize {
        self.targets[original]
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// The same permutation laid out for a list of `count` items.
    pub fn resize(&self, count: usize) -> Result<Self> {
        Self::new(&self.permutation, count)
    }

    /// The full mapping that undoes this one.
    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.targets.len()];
        for (original, &target) in self.targets.iter().enumerate() {
            inverse[target] = original;
        }
        Self {
            permutation: inverse.clone(),
            targets: inverse,
        }
    }
}

/// New text for every position of one site. `None` when the site does not
/// have exactly as many items as the mapping.
pub fn plan_site(items: &[String], mapping: &ParameterMapping) -> Option<Vec<String>> {
    if items.len() != mapping.count() {
        return None;
    }
    let mut out = vec![String::new(); items.len()];
    for (original, text) in items.iter().enumerate() {
        out[mapping.target(original)] = text.clone();
    }
    Some(out)
}

/// Edits reordering one parameter or argument list.
fn reorder_site(file: &SourceFile, items: &[Node], permutation: &[usize], batch: &mut EditBatch) -> bool {
    let mapping = match ParameterMapping::new(permutation, items.len()) {
        Ok(mapping) => mapping,
        Err(e) => {
            tracing::warn!(
                "Skipping site at {}:{}: {}",
                file.path.display(),
                items.first().map(|n| n.start_position().row + 1).unwrap_or(0),
                e
            );
            return false;
        }
    };
    // Capture every text before computing replacements.
    let texts: Vec<String> = items.iter().map(|n| file.node_text(*n).to_string()).collect();
    let Some(planned) = plan_site(&texts, &mapping) else {
        return false;
    };
    for (i, node) in items.iter().enumerate() {
        if planned[i] != texts[i] {
            batch.push(edits::build(&file.path, planned[i].clone(), node.start_byte(), node.end_byte() - node.start_byte()));
        }
    }
    true
}

/// Function-like nodes whose parameters follow the signature named by `name`.
/// Class names stand for every constructor declaration, overloads included.
fn signature_nodes<'tree>(file: &SourceFile, name: Node<'tree>) -> Vec<Node<'tree>> {
    let Some(parent) = name.parent() else {
        return Vec::new();
    };
    match SyntaxKind::of(parent) {
        kind if kind.is_function_like() => vec![parent],
        SyntaxKind::VariableDeclarator => parent
            .child_by_field_name("value")
            .filter(|v| SyntaxKind::of(*v).is_function_like())
            .into_iter()
            .collect(),
        SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration => parent
            .child_by_field_name("body")
            .map(|body| {
                syntax::named_children(body)
                    .into_iter()
                    .filter(|m| {
                        SyntaxKind::of(*m).is_function_like()
                            && m.child_by_field_name("name").map(|n| file.node_text(n)) == Some("constructor")
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Reorders the parameters of `symbol`'s declarations (overloads included)
/// and the arguments of every call site.
pub fn reorder_parameters(program: &Program, symbol: &SymbolId, permutation: &[usize]) -> Result<EditBatch> {
    let references = references::find_references(program, symbol)?;
    let mut batch = EditBatch::new();
    let mut seen: Vec<(std::path::PathBuf, usize)> = Vec::new();
    let mut checked = false;

    for entry in &references {
        let file = program.require_file(&entry.file)?;
        let lists: Vec<Vec<Node>> = match entry.site {
            ReferenceSite::Signature => {
                let Some(name) = locator::find_exact(file.root(), entry.span.start..entry.span.end(), None) else {
                    continue;
                };
                signature_nodes(file, name)
                    .into_iter()
                    .filter_map(syntax::parameters_of)
                    .collect()
            }
            ReferenceSite::Call => references::call_expression_of(file, entry)
                .and_then(syntax::arguments_of)
                .into_iter()
                .collect(),
            ReferenceSite::Import | ReferenceSite::Export => continue,
            ReferenceSite::Mention => {
                match signature_nodes_for_mention(file, entry) {
                    Some(lists) => lists,
                    None => {
                        tracing::warn!(
                            "Skipping reference to {} at {}:{} that is neither a call nor a signature",
                            symbol.name,
                            entry.file.display(),
                            file.offset_to_position(entry.span.start).line + 1
                        );
                        continue;
                    }
                }
            }
        };

        for items in lists {
            let key = (entry.file.clone(), items.first().map(|n| n.start_byte()).unwrap_or(entry.span.start));
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            if entry.is_definition && !checked {
                // The declaration decides whether the permutation is valid at all.
                ParameterMapping::new(permutation, items.len())?;
                checked = true;
            }
            reorder_site(file, &items, permutation, &mut batch);
        }
    }

    batch.validate(program)?;
    tracing::info!(
        "Reordered {} with {:?}: {} edits in {} files",
        symbol.name,
        permutation,
        batch.edits().len(),
        batch.files().len()
    );
    Ok(batch)
}

/// `const f = (a, b) => ...` names its function through a declarator.
fn signature_nodes_for_mention<'tree>(file: &'tree SourceFile, entry: &references::ReferenceEntry) -> Option<Vec<Vec<Node<'tree>>>> {
    if !entry.is_definition {
        return None;
    }
    let name = locator::find_exact(file.root(), entry.span.start..entry.span.end(), None)?;
    let lists: Vec<Vec<Node>> = signature_nodes(file, name)
        .into_iter()
        .filter_map(syntax::parameters_of)
        .collect();
    if lists.is_empty() {
        None
    } else {
        Some(lists)
    }
}

/// The symbol a reorder at `offset` acts on, with its parameter or argument count.
pub fn target_at(program: &Program, file: &SourceFile, offset: usize) -> Result<(SymbolId, usize)> {
    let leaf = locator::find_containing(file.root(), offset..offset)
        .ok_or_else(|| RefactorError::resolution(format!("node at offset {}", offset)))?;
    let target = locator::find_ascendant(
        leaf,
        |n| {
            let kind = SyntaxKind::of(n);
            kind.is_function_like() || kind.is_call_like() || kind.is_signature_like()
        },
        true,
    )
    .ok_or_else(|| RefactorError::not_applicable("no function or call at cursor"))?;

    let kind = SyntaxKind::of(target);
    let (name_node, count) = if kind.is_call_like() {
        let callee = target
            .child_by_field_name("function")
            .or_else(|| target.child_by_field_name("constructor"))
            .ok_or_else(|| RefactorError::resolution("callee"))?;
        let name = match SyntaxKind::of(callee) {
            SyntaxKind::MemberExpression => callee.child_by_field_name("property"),
            SyntaxKind::Identifier => Some(callee),
            _ => None,
        }
        .ok_or_else(|| RefactorError::not_applicable("callee is not a plain name"))?;
        (name, syntax::arguments_of(target).map(|a| a.len()).unwrap_or(0))
    } else {
        let count = syntax::parameters_of(target).map(|p| p.len()).unwrap_or(0);
        let name = match target.child_by_field_name("name") {
            Some(name) if file.node_text(name) == "constructor" => locator::find_ascendant(
                target,
                |n| matches!(SyntaxKind::of(n), SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration),
                false,
            )
            .and_then(|class| class.child_by_field_name("name")),
            Some(name) => Some(name),
            None => target
                .parent()
                .filter(|p| SyntaxKind::of(*p) == SyntaxKind::VariableDeclarator)
                .and_then(|p| p.child_by_field_name("name")),
        }
        .ok_or_else(|| RefactorError::not_applicable("anonymous function"))?;
        (name, count)
    };

    let symbol = program.symbol_at(file, name_node.start_byte())?;
    Ok((symbol, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::apply_edits;
    use std::path::{Path, PathBuf};

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn apply(program: &Program, batch: &EditBatch, path: &str) -> String {
        let file = program.file(Path::new(path)).unwrap();
        apply_edits(&file.path, &file.text, batch.edits()).unwrap()
    }

    #[test]
    fn test_mapping_places_implicit_items_in_free_slots() {
        let mapping = ParameterMapping::new(&[2], 4).unwrap();
        assert_eq!(mapping.targets(), &[2, 0, 1, 3]);
        let mapping = ParameterMapping::new(&[1, 0], 3).unwrap();
        assert_eq!(mapping.targets(), &[1, 0, 2]);
    }

    #[test]
    fn test_invalid_permutations_are_rejected() {
        for (perm, count) in [(vec![0, 3], 3), (vec![1, 1], 3), (vec![0, 1, 2, 3], 3)] {
            let err = ParameterMapping::new(&perm, count).unwrap_err();
            assert!(matches!(err, RefactorError::InvalidPermutation { .. }), "{:?}", perm);
        }
    }

    #[test]
    fn test_plan_site_and_inverse_restore_order() {
        let original = texts(&["a", "b", "c", "d"]);
        let mapping = ParameterMapping::new(&[2, 0], 4).unwrap();
        let reordered = plan_site(&original, &mapping).unwrap();
        assert_eq!(reordered, texts(&["b", "c", "a", "d"]));
        let restored = plan_site(&reordered, &mapping.inverse()).unwrap();
        assert_eq!(restored, original);
        assert!(plan_site(&texts(&["a"]), &mapping).is_none());
    }

    #[test]
    fn test_reorders_declaration_and_call_sites() {
        let program = Program::from_sources(vec![(
            PathBuf::from("/p/a.ts"),
            "function f(a: number, b: string, c: boolean) {}\nf(1, 'x', true)\nf(2)\n".to_string(),
        )]);
        let file = program.file(Path::new("/p/a.ts")).unwrap();
        let (symbol, count) = target_at(&program, file, file.text.find("f(1").unwrap()).unwrap();
        assert_eq!(count, 3);
        let batch = reorder_parameters(&program, &symbol, &[1, 0]).unwrap();
        assert_eq!(
            apply(&program, &batch, "/p/a.ts"),
            "function f(b: string, a: number, c: boolean) {}\nf('x', 1, true)\nf(2)\n"
        );
    }

    #[test]
    fn test_reorder_twice_with_inverse_is_identity() {
        let source = "export function g(a, b, c) { return a }\ng(1, 2, 3)\n";
        let program = Program::from_sources(vec![(PathBuf::from("/p/g.ts"), source.to_string())]);
        let file = program.file(Path::new("/p/g.ts")).unwrap();
        let symbol = program.symbol_at(file, file.text.find("g(a").unwrap()).unwrap();
        let batch = reorder_parameters(&program, &symbol, &[2, 0]).unwrap();
        let once = apply(&program, &batch, "/p/g.ts");
        assert_eq!(once, "export function g(b, c, a) { return a }\ng(2, 3, 1)\n");

        let inverse = ParameterMapping::new(&[2, 0], 3).unwrap().inverse();
        let program = Program::from_sources(vec![(PathBuf::from("/p/g.ts"), once.clone())]);
        let file = program.file(Path::new("/p/g.ts")).unwrap();
        let symbol = program.symbol_at(file, file.text.find("g(b").unwrap()).unwrap();
        let batch = reorder_parameters(&program, &symbol, inverse.targets()).unwrap();
        assert_eq!(apply(&program, &batch, "/p/g.ts"), source);
    }

    #[test]
    fn test_reorders_constructor_through_new() {
        let program = Program::from_sources(vec![(
            PathBuf::from("/p/c.ts"),
            "class C {\n  constructor(a: number, b: string) {}\n}\nconst c = new C(1, 'x')\n".to_string(),
        )]);
        let file = program.file(Path::new("/p/c.ts")).unwrap();
        let (symbol, _) = target_at(&program, file, file.text.find("new C").unwrap()).unwrap();
        let batch = reorder_parameters(&program, &symbol, &[1, 0]).unwrap();
        assert_eq!(
            apply(&program, &batch, "/p/c.ts"),
            "class C {\n  constructor(b: string, a: number) {}\n}\nconst c = new C('x', 1)\n"
        );
    }

    #[test]
    fn test_declaration_rejects_out_of_range_permutation() {
        let program = Program::from_sources(vec![(
            PathBuf::from("/p/a.ts"),
            "function f(a, b) {}\nf(1, 2)\n".to_string(),
        )]);
        let file = program.file(Path::new("/p/a.ts")).unwrap();
        let symbol = program.symbol_at(file, file.text.find("f(a").unwrap()).unwrap();
        let err = reorder_parameters(&program, &symbol, &[2, 0]).unwrap_err();
        assert!(matches!(err, RefactorError::InvalidPermutation { .. }));
    }
}
