//! Reference Resolver: every syntactic use of a resolved symbol.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;
use tree_sitter::Node;

use crate::document::SourceFile;
use crate::edits::Span;
use crate::error::Result;
use crate::imports;
use crate::locator;
use crate::program::{Program, SymbolId};
use crate::syntax::{self, SyntaxKind};

/// How a reference is used at its site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceSite {
    /// Callee of a call or `new` expression.
    Call,
    /// Name of a function-like declaration or signature.
    Signature,
    Import,
    Export,
    Mention,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub file: PathBuf,
    pub span: Span,
    pub is_definition: bool,
    pub site: ReferenceSite,
}

/// Surroundings of a reference, re-located in the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteContext {
    pub site: ReferenceSite,
    pub node: SyntaxKind,
    pub parent: Option<SyntaxKind>,
    pub grandparent: Option<SyntaxKind>,
}

/// Deduplicate references by (file, span) - sorts and removes duplicates
fn deduplicate_references(results: &mut Vec<ReferenceEntry>) {
    results.sort_by(|a, b| (&a.file, a.span).cmp(&(&b.file, b.span)));
    results.dedup_by(|a, b| a.file == b.file && a.span == b.span);
}

fn short_name(symbol: &SymbolId) -> &str {
    symbol.name.rsplit('.').next().unwrap_or(&symbol.name)
}

/// Local names in `file` that are bound by an import of `symbol` under another name.
fn alias_names(program: &Program, file: &SourceFile, symbol: &SymbolId) -> HashSet<String> {
    let mut aliases = HashSet::new();
    for import in imports::extract_imports(file) {
        for local in import.locals() {
            if local == short_name(symbol) {
                continue;
            }
            if let Ok(Some(resolved)) = program.resolve_top_level_name(file, local) {
                if &resolved == symbol {
                    aliases.insert(local.to_string());
                }
            }
        }
    }
    aliases
}

/// Finds every use of `symbol` in the program, the declaration(s) included.
pub fn find_references(program: &Program, symbol: &SymbolId) -> Result<Vec<ReferenceEntry>> {
    let is_member = symbol.name.contains('.');
    let definitions: HashSet<usize> = if is_member {
        [symbol.start].into_iter().collect()
    } else {
        program
            .declarations_of(symbol)
            .iter()
            .map(|d| d.name_range.start)
            .collect()
    };

    let mut results = Vec::new();
    for file in program.files() {
        // Members are only referenced through `this` inside their own class.
        if is_member && file.path != symbol.file {
            continue;
        }
        let mut names = alias_names(program, file, symbol);
        names.insert(short_name(symbol).to_string());

        let mut candidates = Vec::new();
        syntax::walk_descendants(file.root(), &mut |node| {
            let kind = SyntaxKind::of(node);
            if (kind.is_binding_reference() || kind == SyntaxKind::PropertyIdentifier)
                && names.contains(file.node_text(node))
            {
                candidates.push(node);
            }
        });

        for node in candidates {
            let is_definition = file.path == symbol.file && definitions.contains(&node.start_byte());
            let resolved = is_definition
                || match program.resolve_name_at(file, node) {
                    Ok(resolved) => resolved.as_ref() == Some(symbol),
                    Err(e) => {
                        tracing::warn!("Skipping unresolvable `{}` in {}: {}", file.node_text(node), file.path.display(), e);
                        false
                    }
                };
            if !resolved {
                continue;
            }
            results.push(ReferenceEntry {
                file: file.path.clone(),
                span: Span::from_range(node.byte_range()),
                is_definition,
                site: classify_node(node),
            });
        }
    }

    deduplicate_references(&mut results);
    tracing::debug!("Found {} references to {}", results.len(), symbol.name);
    Ok(results)
}

fn is_field(parent: Node, field: &str, node: Node) -> bool {
    parent.child_by_field_name(field) == Some(node)
}

fn classify_node(node: Node) -> ReferenceSite {
    let Some(parent) = node.parent() else {
        return ReferenceSite::Mention;
    };
    match SyntaxKind::of(parent) {
        SyntaxKind::ImportSpecifier | SyntaxKind::ImportClause | SyntaxKind::NamespaceImport => ReferenceSite::Import,
        SyntaxKind::ExportSpecifier => ReferenceSite::Export,
        SyntaxKind::CallExpression if is_field(parent, "function", node) => ReferenceSite::Call,
        SyntaxKind::NewExpression if is_field(parent, "constructor", node) => ReferenceSite::Call,
        SyntaxKind::MemberExpression if is_field(parent, "property", node) => match parent.parent() {
            Some(grand) if SyntaxKind::of(grand) == SyntaxKind::CallExpression && is_field(grand, "function", parent) => {
                ReferenceSite::Call
            }
            _ => ReferenceSite::Mention,
        },
        kind if kind.is_function_like() && is_field(parent, "name", node) => ReferenceSite::Signature,
        SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration if is_field(parent, "name", node) => {
            ReferenceSite::Signature
        }
        _ => ReferenceSite::Mention,
    }
}

/// Re-locates `entry` in `program` and describes where it sits.
pub fn classify_reference_site(program: &Program, entry: &ReferenceEntry) -> Option<SiteContext> {
    let file = program.file(&entry.file)?;
    let range = entry.span.start..entry.span.end();
    let node = locator::find_exact(file.root(), range, None)?;
    let parent = node.parent();
    Some(SiteContext {
        site: classify_node(node),
        node: SyntaxKind::of(node),
        parent: parent.map(SyntaxKind::of),
        grandparent: parent.and_then(|p| p.parent()).map(SyntaxKind::of),
    })
}

/// The call or `new` expression of a `Call` reference.
pub fn call_expression_of<'tree>(file: &'tree SourceFile, entry: &ReferenceEntry) -> Option<Node<'tree>> {
    let node = locator::find_exact(file.root(), entry.span.start..entry.span.end(), None)?;
    locator::find_ascendant(node, |n| SyntaxKind::of(n).is_call_like(), false)
}

/// The function-like declaration named by a `Signature` reference.
pub fn signature_of<'tree>(file: &'tree SourceFile, entry: &ReferenceEntry) -> Option<Node<'tree>> {
    let node = locator::find_exact(file.root(), entry.span.start..entry.span.end(), None)?;
    node.parent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn program(files: &[(&str, &str)]) -> Program {
        Program::from_sources(files.iter().map(|(p, t)| (PathBuf::from(p), t.to_string())))
    }

    fn symbol(program: &Program, path: &str, needle: &str) -> SymbolId {
        let file = program.file(Path::new(path)).unwrap();
        program.symbol_at(file, file.text.find(needle).unwrap()).unwrap()
    }

    #[test]
    fn test_finds_references_across_files() {
        let p = program(&[
            ("/p/lib.ts", "export function f(a: number, b: number) { return a - b }\nf(1, 2)\n"),
            (
                "/p/use.ts",
                "import { f as g } from './lib'\nimport { f } from './lib'\nconst x = g(3, 4) + f(5, 6)\nconst h = f\n",
            ),
            ("/p/other.ts", "function f() {}\nf()\n"),
        ]);
        let f = symbol(&p, "/p/lib.ts", "f(a");
        let refs = find_references(&p, &f).unwrap();

        let in_lib: Vec<_> = refs.iter().filter(|r| r.file == Path::new("/p/lib.ts")).collect();
        assert_eq!(in_lib.len(), 2);
        assert!(in_lib[0].is_definition);
        assert_eq!(in_lib[0].site, ReferenceSite::Signature);
        assert_eq!(in_lib[1].site, ReferenceSite::Call);

        let sites: Vec<_> = refs
            .iter()
            .filter(|r| r.file == Path::new("/p/use.ts"))
            .map(|r| r.site)
            .collect();
        assert_eq!(
            sites,
            vec![
                ReferenceSite::Import,
                ReferenceSite::Import,
                ReferenceSite::Call,
                ReferenceSite::Call,
                ReferenceSite::Mention,
            ]
        );
        assert!(refs.iter().all(|r| r.file != Path::new("/p/other.ts")));
    }

    #[test]
    fn test_shadowed_names_are_not_references() {
        let p = program(&[(
            "/p/a.ts",
            "export function f() {}\nfunction g(f: () => void) { f() }\nf()\n",
        )]);
        let f = symbol(&p, "/p/a.ts", "f()");
        let refs = find_references(&p, &f).unwrap();
        assert_eq!(refs.len(), 2);
        assert!(refs[0].is_definition);
        assert_eq!(refs[1].site, ReferenceSite::Call);
    }

    #[test]
    fn test_classify_reference_site() {
        let p = program(&[("/p/a.ts", "class C { constructor(a: number) {} }\nnew C(1)\n")]);
        let c = symbol(&p, "/p/a.ts", "C {");
        let refs = find_references(&p, &c).unwrap();
        assert_eq!(refs.len(), 2);
        let ctx = classify_reference_site(&p, &refs[1]).unwrap();
        assert_eq!(ctx.site, ReferenceSite::Call);
        assert_eq!(ctx.parent, Some(SyntaxKind::NewExpression));
        assert_eq!(ctx.grandparent, Some(SyntaxKind::ExpressionStatement));
    }

    #[test]
    fn test_method_references_through_this() {
        let p = program(&[(
            "/p/k.ts",
            "class K {\n  m(a: number, b: string) {}\n  run() { this.m(1, 'x'); other.m(2, 'y') }\n}\n",
        )]);
        let m = symbol(&p, "/p/k.ts", "m(a");
        let refs = find_references(&p, &m).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].site, ReferenceSite::Signature);
        assert_eq!(refs[1].site, ReferenceSite::Call);
    }

    #[test]
    fn test_reference_entries_serialize() {
        let p = program(&[("/p/a.ts", "export const v = 1
console.log(v)
")]);
        let v = symbol(&p, "/p/a.ts", "v =");
        let refs = find_references(&p, &v).unwrap();
        let json = serde_json::to_value(&refs).unwrap();
        assert_eq!(json[0]["span"]["start"], 13);
        assert_eq!(json[0]["span"]["length"], 1);
        assert_eq!(json[1]["site"], "Mention");
    }
}
