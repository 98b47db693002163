//! Import declarations: extraction, rendering and normalization.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use tree_sitter::Node;

use crate::config::QuoteStyle;
use crate::document::SourceFile;
use crate::edits::{self, TextEdit};
use crate::error::{RefactorError, Result};
use crate::syntax::{self, SyntaxKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinding {
    /// Name exported by the imported module.
    pub name: String,
    pub alias: Option<String>,
    pub type_only: bool,
    pub range: Range<usize>,
}

impl NamedBinding {
    pub fn new(name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            name: name.into(),
            alias,
            type_only: false,
            range: 0..0,
        }
    }

    /// Name the binding introduces in the importing file.
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn render(&self) -> String {
        let prefix = if self.type_only { "type " } else { "" };
        match &self.alias {
            Some(alias) if alias != &self.name => format!("{}{} as {}", prefix, self.name, alias),
            _ => format!("{}{}", prefix, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub specifier: String,
    /// Span of the specifier text, quotes excluded.
    pub specifier_range: Range<usize>,
    pub default: Option<String>,
    pub default_range: Option<Range<usize>>,
    pub namespace: Option<String>,
    pub named: Vec<NamedBinding>,
    pub type_only: bool,
    /// Span of the whole statement.
    pub range: Range<usize>,
}

impl ImportDecl {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            specifier_range: 0..0,
            default: None,
            default_range: None,
            namespace: None,
            named: Vec::new(),
            type_only: false,
            range: 0..0,
        }
    }

    pub fn with_named(mut self, binding: NamedBinding) -> Self {
        self.named.push(binding);
        self
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    pub fn is_relative(&self) -> bool {
        is_relative_specifier(&self.specifier)
    }

    /// `import "./polyfill"` binds nothing and is always kept.
    pub fn is_side_effect(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }

    /// Local names this import introduces.
    pub fn locals(&self) -> Vec<&str> {
        let mut locals = Vec::new();
        if let Some(default) = &self.default {
            locals.push(default.as_str());
        }
        if let Some(namespace) = &self.namespace {
            locals.push(namespace.as_str());
        }
        locals.extend(self.named.iter().map(NamedBinding::local));
        locals
    }

    pub fn render(&self, quote: QuoteStyle) -> String {
        let q = quote.as_char();
        if self.is_side_effect() {
            return format!("import {}{}{};", q, self.specifier, q);
        }
        let mut parts = Vec::new();
        if let Some(default) = &self.default {
            parts.push(default.clone());
        }
        if let Some(namespace) = &self.namespace {
            parts.push(format!("* as {}", namespace));
        }
        if !self.named.is_empty() {
            let names: Vec<String> = self.named.iter().map(NamedBinding::render).collect();
            parts.push(format!("{{ {} }}", names.join(", ")));
        }
        let type_prefix = if self.type_only { "type " } else { "" };
        format!(
            "import {}{} from {}{}{};",
            type_prefix,
            parts.join(", "),
            q,
            self.specifier,
            q
        )
    }
}

/// `export { a as b } from "./x"` and `export * from "./x"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReExportDecl {
    pub specifier: String,
    pub specifier_range: Range<usize>,
    /// `name` is the name in the source module, `alias` the exported name.
    pub named: Vec<NamedBinding>,
    pub star: bool,
    pub range: Range<usize>,
}

impl ReExportDecl {
    pub fn exported_name<'a>(&self, binding: &'a NamedBinding) -> &'a str {
        binding.local()
    }
}

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

fn string_contents(node: Node, source: &str) -> (String, Range<usize>) {
    let range = node.byte_range();
    if range.end - range.start >= 2 {
        let inner = range.start + 1..range.end - 1;
        (source[inner.clone()].to_string(), inner)
    } else {
        (String::new(), range)
    }
}

fn named_bindings(list: Node, source: &str) -> Vec<NamedBinding> {
    syntax::named_children(list)
        .into_iter()
        .filter(|n| matches!(SyntaxKind::of(*n), SyntaxKind::ImportSpecifier | SyntaxKind::ExportSpecifier))
        .filter_map(|spec| {
            let name = spec.child_by_field_name("name")?;
            let alias = spec.child_by_field_name("alias");
            Some(NamedBinding {
                name: syntax::node_text(name, source).to_string(),
                alias: alias.map(|a| syntax::node_text(a, source).to_string()),
                type_only: syntax::has_token(spec, "type"),
                range: spec.byte_range(),
            })
        })
        .collect()
}

fn parse_import(node: Node, source: &str) -> Option<ImportDecl> {
    let source_node = node.child_by_field_name("source")?;
    let (specifier, specifier_range) = string_contents(source_node, source);
    let mut decl = ImportDecl::new(specifier);
    decl.specifier_range = specifier_range;
    decl.range = node.byte_range();
    decl.type_only = syntax::has_token(node, "type");

    if let Some(clause) = syntax::child_of_kind(node, SyntaxKind::ImportClause) {
        for part in syntax::named_children(clause) {
            match SyntaxKind::of(part) {
                SyntaxKind::Identifier => {
                    decl.default = Some(syntax::node_text(part, source).to_string());
                    decl.default_range = Some(part.byte_range());
                }
                SyntaxKind::NamespaceImport => {
                    decl.namespace = syntax::named_children(part)
                        .first()
                        .map(|id| syntax::node_text(*id, source).to_string());
                }
                SyntaxKind::NamedImports => {
                    decl.named = named_bindings(part, source);
                }
                _ => {}
            }
        }
    }
    Some(decl)
}

/// Top-level import statements in document order.
pub fn extract_imports(file: &SourceFile) -> Vec<ImportDecl> {
    syntax::named_children(file.root())
        .into_iter()
        .filter(|n| SyntaxKind::of(*n) == SyntaxKind::ImportStatement)
        .filter_map(|n| parse_import(n, &file.text))
        .collect()
}

/// Top-level `export ... from` statements in document order.
pub fn extract_reexports(file: &SourceFile) -> Vec<ReExportDecl> {
    let source = file.text.as_str();
    syntax::named_children(file.root())
        .into_iter()
        .filter(|n| SyntaxKind::of(*n) == SyntaxKind::ExportStatement)
        .filter_map(|node| {
            let source_node = node.child_by_field_name("source")?;
            let (specifier, specifier_range) = string_contents(source_node, source);
            let clause = syntax::child_of_kind(node, SyntaxKind::ExportClause);
            Some(ReExportDecl {
                specifier,
                specifier_range,
                named: clause.map(|c| named_bindings(c, source)).unwrap_or_default(),
                star: clause.is_none(),
                range: node.byte_range(),
            })
        })
        .collect()
}

/// `export { a, b as c }` without a `from` clause: (local, exported) pairs.
pub fn extract_local_exports(file: &SourceFile) -> Vec<NamedBinding> {
    let source = file.text.as_str();
    syntax::named_children(file.root())
        .into_iter()
        .filter(|n| SyntaxKind::of(*n) == SyntaxKind::ExportStatement && n.child_by_field_name("source").is_none())
        .filter_map(|n| syntax::child_of_kind(n, SyntaxKind::ExportClause))
        .flat_map(|clause| named_bindings(clause, source))
        .collect()
}

/// Identifier texts used outside import statements.
pub fn used_names(file: &SourceFile) -> HashSet<String> {
    fn visit(node: Node, source: &str, out: &mut HashSet<String>) {
        if SyntaxKind::of(node) == SyntaxKind::ImportStatement {
            return;
        }
        if SyntaxKind::of(node).is_binding_reference() {
            out.insert(syntax::node_text(node, source).to_string());
        }
        for child in syntax::children(node) {
            visit(child, source, out);
        }
    }
    let mut out = HashSet::new();
    visit(file.root(), &file.text, &mut out);
    out
}

/// Working buffer for [`organize_imports`]. Owned by the caller and reset at
/// the start of each call, so concurrent operations never share state.
#[derive(Debug, Default)]
pub struct ImportScratch {
    decls: Vec<ImportDecl>,
    used: HashSet<String>,
}

impl ImportScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.decls.clear();
        self.used.clear();
    }
}

struct Normalized {
    decl: ImportDecl,
    /// Original statement text when the declaration did not change.
    verbatim: Option<String>,
}

fn merge_key(decl: &ImportDecl) -> Option<(String, bool)> {
    // Namespace imports cannot share a statement with named bindings.
    if decl.namespace.is_some() || decl.is_side_effect() {
        None
    } else {
        Some((decl.specifier.clone(), decl.type_only))
    }
}

fn normalize(file: &SourceFile, scratch: &mut ImportScratch) -> Vec<Normalized> {
    let mut out: Vec<Normalized> = Vec::new();
    for decl in scratch.decls.drain(..) {
        let original = file.text[decl.range.clone()].to_string();
        let mut kept = decl.clone();
        kept.named.retain(|b| scratch.used.contains(b.local()));
        if kept.default.as_deref().is_some_and(|d| !scratch.used.contains(d)) {
            kept.default = None;
        }
        if kept.namespace.as_deref().is_some_and(|n| !scratch.used.contains(n)) {
            kept.namespace = None;
        }
        if kept.is_side_effect() && !decl.is_side_effect() {
            continue;
        }

        let mut changed = kept != decl;
        if let Some(key) = merge_key(&kept) {
            if let Some(existing) = out.iter_mut().find(|n| merge_key(&n.decl).as_ref() == Some(&key)) {
                let default_clash = existing.decl.default.is_some()
                    && kept.default.is_some()
                    && existing.decl.default != kept.default;
                if !default_clash {
                    if existing.decl.default.is_none() {
                        existing.decl.default = kept.default.take();
                    }
                    for binding in kept.named {
                        if !existing.decl.named.iter().any(|b| b.name == binding.name && b.local() == binding.local()) {
                            existing.decl.named.push(binding);
                        }
                    }
                    existing.verbatim = None;
                    continue;
                }
            }
        }

        let sorted = kept.named.windows(2).all(|w| w[0].name <= w[1].name);
        if !sorted {
            kept.named.sort_by(|a, b| a.name.cmp(&b.name));
            changed = true;
        }
        out.push(Normalized {
            decl: kept,
            verbatim: if changed { None } else { Some(original) },
        });
    }
    for n in out.iter_mut() {
        if n.verbatim.is_none() {
            n.decl.named.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }
    out.sort_by(|a, b| {
        a.decl
            .is_relative()
            .cmp(&b.decl.is_relative())
            .then_with(|| a.decl.specifier.cmp(&b.decl.specifier))
    });
    out
}

/// Normalizes the imports of `file`: merges declarations that share a
/// specifier, drops unused bindings, sorts library specifiers before relative
/// ones and then by specifier, and sorts named bindings. Returns the new text.
pub fn organize_imports(file: &SourceFile, scratch: &mut ImportScratch, quote: QuoteStyle) -> Result<String> {
    scratch.reset();
    scratch.decls = extract_imports(file);
    if scratch.decls.is_empty() {
        return Ok(file.text.clone());
    }
    scratch.used = used_names(file);

    let ranges: Vec<Range<usize>> = scratch.decls.iter().map(|d| d.range.clone()).collect();
    let normalized = normalize(file, scratch);
    let block: Vec<String> = normalized
        .iter()
        .map(|n| n.verbatim.clone().unwrap_or_else(|| n.decl.render(quote)))
        .collect();

    let mut edits: Vec<TextEdit> = Vec::new();
    for (i, range) in ranges.iter().enumerate() {
        let extent = edits::line_extent(&file.text, range.clone());
        if i == 0 && !block.is_empty() {
            let mut text = block.join("\n");
            if extent.end > range.end {
                text.push('\n');
            }
            edits.push(edits::build(&file.path, text, extent.start, extent.end - extent.start));
        } else {
            edits.push(edits::delete(&file.path, extent));
        }
    }
    edits::apply_edits(&file.path, &file.text, &edits)
}

/// Reparses `text` as `path` and organizes its imports.
pub fn organize_text(path: &Path, text: &str, scratch: &mut ImportScratch, quote: QuoteStyle) -> Result<String> {
    let file = SourceFile::parse(path, text).ok_or_else(|| RefactorError::resolution(format!("parse of {}", path.display())))?;
    organize_imports(&file, scratch, quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(source: &str) -> SourceFile {
        SourceFile::parse("/p/a.ts", source).unwrap()
    }

    #[test]
    fn test_extract_import_forms() {
        let f = file(
            "import def, { a, b as c } from './x';\nimport * as ns from 'lib';\nimport type { T } from \"./t\"\nimport './side';\n",
        );
        let imports = extract_imports(&f);
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0].default.as_deref(), Some("def"));
        assert_eq!(imports[0].named[1].name, "b");
        assert_eq!(imports[0].named[1].local(), "c");
        assert_eq!(&f.text[imports[0].specifier_range.clone()], "./x");
        assert_eq!(imports[1].namespace.as_deref(), Some("ns"));
        assert!(!imports[1].is_relative());
        assert!(imports[2].type_only);
        assert!(imports[3].is_side_effect());
    }

    #[test]
    fn test_extract_reexports() {
        let f = file("export { a as b } from './x';\nexport * from './y';\nexport { c };\nconst c = 1;\n");
        let re = extract_reexports(&f);
        assert_eq!(re.len(), 2);
        assert_eq!(re[0].named[0].name, "a");
        assert_eq!(re[0].exported_name(&re[0].named[0]), "b");
        assert!(re[1].star);
        let local = extract_local_exports(&f);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "c");
    }

    #[test]
    fn test_render() {
        let decl = ImportDecl::new("./dest")
            .with_named(NamedBinding::new("I1", Some("Interface1".to_string())));
        assert_eq!(decl.render(QuoteStyle::Double), "import { I1 as Interface1 } from \"./dest\";");
        let decl = ImportDecl::new("./dest").with_default("utility1");
        assert_eq!(decl.render(QuoteStyle::Single), "import utility1 from './dest';");
    }

    #[test]
    fn test_organize_merges_sorts_and_drops_unused() {
        let f = file(
            "import { f3 } from \"./f2\";\nimport { z, a } from './util';\nimport { f1 } from 'a-library-f1';\nimport { b } from './util';\nimport { unused } from './gone';\nexport function f2(x: any) { return f3(f1(a(b(z(x))))) }\n",
        );
        let mut scratch = ImportScratch::new();
        let out = organize_imports(&f, &mut scratch, QuoteStyle::Double).unwrap();
        assert_eq!(
            out,
            "import { f1 } from 'a-library-f1';\nimport { f3 } from \"./f2\";\nimport { a, b, z } from \"./util\";\nexport function f2(x: any) { return f3(f1(a(b(z(x))))) }\n"
        );
    }

    #[test]
    fn test_organize_removes_all_unused_imports() {
        let f = file("import { x } from './x';\nimport './polyfill';\nfoo();\n");
        let mut scratch = ImportScratch::new();
        let out = organize_imports(&f, &mut scratch, QuoteStyle::Double).unwrap();
        assert_eq!(out, "import './polyfill';\nfoo();\n");
    }

    #[test]
    fn test_organize_without_imports_is_identity() {
        let f = file("export const a = 1;\n");
        let mut scratch = ImportScratch::new();
        assert_eq!(organize_imports(&f, &mut scratch, QuoteStyle::Double).unwrap(), f.text);
    }

    #[test]
    fn test_type_references_count_as_uses() {
        let f = file("import { Food } from './food';\nexport class Lion { eat(meat: Food) {} }\n");
        let mut scratch = ImportScratch::new();
        assert_eq!(organize_imports(&f, &mut scratch, QuoteStyle::Double).unwrap(), f.text);
    }
}
