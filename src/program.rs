//! Program snapshot and symbol resolution.
//!
//! A [`Program`] is an immutable set of parsed files. Symbols are identified by
//! their declaring file and the start of their first declaration name, so two
//! uses refer to the same thing exactly when their [`SymbolId`]s are equal.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tree_sitter::Node;

use crate::document::{Declaration, SourceFile};
use crate::error::{RefactorError, Result};
use crate::imports::{self, ImportDecl};
use crate::locator;
use crate::syntax::{self, DeclarationKind, SyntaxKind};

const MAX_EXPORT_DEPTH: usize = 8;

/// Resolved identity of a top-level declaration (or of a class member, whose
/// `name` is `Class.member`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId {
    pub file: PathBuf,
    pub name: String,
    pub start: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    files: BTreeMap<PathBuf, Arc<SourceFile>>,
}

/// How an import-bound local name resolved.
enum ImportTarget {
    Symbol(SymbolId),
    Namespace,
    Unresolved,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: impl IntoIterator<Item = Arc<SourceFile>>) -> Self {
        Self {
            files: files.into_iter().map(|f| (f.path.clone(), f)).collect(),
        }
    }

    /// Parses in-memory sources; files that fail to parse are skipped.
    pub fn from_sources(sources: impl IntoIterator<Item = (PathBuf, String)>) -> Self {
        let mut program = Self::new();
        for (path, text) in sources {
            match SourceFile::parse(path.clone(), text) {
                Some(file) => program.insert(Arc::new(file)),
                None => tracing::warn!("Failed to parse {}", path.display()),
            }
        }
        program
    }

    pub fn insert(&mut self, file: Arc<SourceFile>) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<SourceFile>> {
        self.files.remove(path)
    }

    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path).map(|f| f.as_ref())
    }

    pub fn require_file(&self, path: &Path) -> Result<&SourceFile> {
        self.file(path)
            .ok_or_else(|| RefactorError::resolution(format!("file {}", path.display())))
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values().map(|f| f.as_ref())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolves a relative module specifier to a program file. Library
    /// specifiers and unknown paths resolve to `None`.
    pub fn resolve_module(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        if !imports::is_relative_specifier(specifier) {
            return None;
        }
        let base = normalize_path(&from.parent().unwrap_or_else(|| Path::new("/")).join(specifier));
        let base_str = base.to_string_lossy().to_string();
        let mut candidates = vec![base.clone()];
        for ext in ["ts", "tsx", "d.ts"] {
            candidates.push(PathBuf::from(format!("{}.{}", base_str, ext)));
        }
        if let Some(stem) = base_str.strip_suffix(".js") {
            candidates.push(PathBuf::from(format!("{}.ts", stem)));
            candidates.push(PathBuf::from(format!("{}.tsx", stem)));
        }
        for index in ["index.ts", "index.tsx", "index.d.ts"] {
            candidates.push(base.join(index));
        }
        candidates.into_iter().find(|c| self.contains(c))
    }

    /// The declarations forming one symbol: an overload group or merged
    /// interfaces count once, anything else sharing the name is ambiguous.
    pub fn declaration_group<'a>(&'a self, file: &'a SourceFile, name: &str) -> Result<Vec<&'a Declaration>> {
        let group: Vec<&Declaration> = file.declarations.iter().filter(|d| d.name == name).collect();
        if group.len() <= 1 {
            return Ok(group);
        }
        let all_functions = group.iter().all(|d| d.kind.is_function());
        let all_interfaces = group.iter().all(|d| d.kind == DeclarationKind::Interface);
        if all_functions || all_interfaces {
            Ok(group)
        } else {
            Err(RefactorError::AmbiguousTarget {
                name: name.to_string(),
                file: file.path.clone(),
                candidates: group.len(),
            })
        }
    }

    fn group_symbol(&self, file: &SourceFile, name: &str) -> Result<Option<SymbolId>> {
        let group = self.declaration_group(file, name)?;
        Ok(group.first().map(|d| SymbolId {
            file: file.path.clone(),
            name: d.name.clone(),
            start: d.name_range.start,
        }))
    }

    pub fn declaration_symbol(&self, file: &SourceFile, decl: &Declaration) -> Result<SymbolId> {
        self.group_symbol(file, &decl.name)?
            .ok_or_else(|| RefactorError::resolution(format!("declaration {}", decl.name)))
    }

    /// Declarations belonging to `symbol`, overloads included, in document order.
    pub fn declarations_of(&self, symbol: &SymbolId) -> Vec<&Declaration> {
        let Some(file) = self.file(&symbol.file) else {
            return Vec::new();
        };
        match self.declaration_group(file, &symbol.name) {
            Ok(group) if group.first().map(|d| d.name_range.start) == Some(symbol.start) => group,
            _ => Vec::new(),
        }
    }

    /// Resolves a name visible at the top level of `file`: its own
    /// declarations first, then its import bindings.
    pub fn resolve_top_level_name(&self, file: &SourceFile, name: &str) -> Result<Option<SymbolId>> {
        if let Some(symbol) = self.group_symbol(file, name)? {
            return Ok(Some(symbol));
        }
        match self.resolve_import_binding(file, name, 0)? {
            ImportTarget::Symbol(symbol) => Ok(Some(symbol)),
            ImportTarget::Namespace | ImportTarget::Unresolved => Ok(None),
        }
    }

    fn resolve_import_binding(&self, file: &SourceFile, local: &str, depth: usize) -> Result<ImportTarget> {
        for import in imports::extract_imports(file) {
            if !import.locals().contains(&local) {
                continue;
            }
            let Some(target) = self.resolve_module(&file.path, &import.specifier) else {
                return Ok(ImportTarget::Unresolved);
            };
            if import.namespace.as_deref() == Some(local) {
                return Ok(ImportTarget::Namespace);
            }
            let resolved = if import.default.as_deref() == Some(local) {
                self.resolve_default_export_at(&target, depth + 1)?
            } else {
                match import.named.iter().find(|b| b.local() == local) {
                    Some(binding) if binding.name == "default" => self.resolve_default_export_at(&target, depth + 1)?,
                    Some(binding) => self.resolve_export_at(&target, &binding.name, depth + 1)?,
                    None => None,
                }
            };
            return Ok(resolved.map(ImportTarget::Symbol).unwrap_or(ImportTarget::Unresolved));
        }
        Ok(ImportTarget::Unresolved)
    }

    /// Follows `export` declarations, `export { a as b }` clauses and
    /// re-exports to the declaration exported from `file` as `name`.
    pub fn resolve_export(&self, file: &Path, name: &str) -> Result<Option<SymbolId>> {
        self.resolve_export_at(file, name, 0)
    }

    fn resolve_export_at(&self, path: &Path, name: &str, depth: usize) -> Result<Option<SymbolId>> {
        if depth > MAX_EXPORT_DEPTH {
            return Ok(None);
        }
        let Some(file) = self.file(path) else {
            return Ok(None);
        };
        if file.declarations_named(name).any(|d| d.exported && !d.default_export) {
            return self.group_symbol(file, name);
        }
        for binding in imports::extract_local_exports(file) {
            if binding.local() == name {
                if let Some(symbol) = self.group_symbol(file, &binding.name)? {
                    return Ok(Some(symbol));
                }
                if let ImportTarget::Symbol(symbol) = self.resolve_import_binding(file, &binding.name, depth)? {
                    return Ok(Some(symbol));
                }
            }
        }
        for reexport in imports::extract_reexports(file) {
            let Some(target) = self.resolve_module(path, &reexport.specifier) else {
                continue;
            };
            if reexport.star {
                if let Some(symbol) = self.resolve_export_at(&target, name, depth + 1)? {
                    return Ok(Some(symbol));
                }
            } else if let Some(binding) = reexport.named.iter().find(|b| b.local() == name) {
                return self.resolve_export_at(&target, &binding.name, depth + 1);
            }
        }
        Ok(None)
    }

    pub fn resolve_default_export(&self, file: &Path) -> Result<Option<SymbolId>> {
        self.resolve_default_export_at(file, 0)
    }

    fn resolve_default_export_at(&self, path: &Path, depth: usize) -> Result<Option<SymbolId>> {
        if depth > MAX_EXPORT_DEPTH {
            return Ok(None);
        }
        let Some(file) = self.file(path) else {
            return Ok(None);
        };
        if let Some(decl) = file.declarations.iter().find(|d| d.default_export) {
            return self.group_symbol(file, &decl.name);
        }
        for statement in syntax::named_children(file.root()) {
            if SyntaxKind::of(statement) != SyntaxKind::ExportStatement || !syntax::has_token(statement, "default") {
                continue;
            }
            if let Some(value) = statement.child_by_field_name("value") {
                if SyntaxKind::of(value) == SyntaxKind::Identifier {
                    return self.resolve_top_level_name(file, file.node_text(value));
                }
            }
        }
        for binding in imports::extract_local_exports(file) {
            if binding.local() == "default" {
                return self.resolve_top_level_name(file, &binding.name);
            }
        }
        Ok(None)
    }

    /// Resolves a name node of `file` to the symbol it refers to, honoring
    /// shadowing by parameters, block-scoped declarations and type parameters.
    /// Returns `None` for locals, namespace imports and unresolvable names.
    pub fn resolve_name_at(&self, file: &SourceFile, node: Node) -> Result<Option<SymbolId>> {
        let kind = SyntaxKind::of(node);
        let name = file.node_text(node);

        if kind == SyntaxKind::PropertyIdentifier {
            return Ok(self.resolve_member_at(file, node));
        }
        if !kind.is_binding_reference() {
            return Ok(None);
        }

        if let Some(parent) = node.parent() {
            match SyntaxKind::of(parent) {
                SyntaxKind::ImportSpecifier => return self.resolve_import_specifier(file, parent, node),
                SyntaxKind::ExportSpecifier => return self.resolve_export_specifier(file, parent, node),
                _ => {}
            }
        }

        let is_type = kind == SyntaxKind::TypeIdentifier;
        let mut scope = node.parent();
        while let Some(current) = scope {
            if SyntaxKind::of(current) == SyntaxKind::Program {
                break;
            }
            if scope_binds(current, name, &file.text, is_type) {
                return Ok(None);
            }
            scope = current.parent();
        }
        self.resolve_top_level_name(file, name)
    }

    fn resolve_import_specifier(&self, file: &SourceFile, spec: Node, node: Node) -> Result<Option<SymbolId>> {
        // Only the imported name refers to the exported symbol; an alias is a new local.
        if spec.child_by_field_name("name") != Some(node) {
            return Ok(None);
        }
        let Some(statement) = locator::find_ascendant_of_kind(spec, SyntaxKind::ImportStatement, false) else {
            return Ok(None);
        };
        let Some(import) = imports::extract_imports(file).into_iter().find(|i| i.range == statement.byte_range()) else {
            return Ok(None);
        };
        let Some(target) = self.resolve_module(&file.path, &import.specifier) else {
            return Ok(None);
        };
        let name = file.node_text(node);
        if name == "default" {
            self.resolve_default_export(&target)
        } else {
            self.resolve_export(&target, name)
        }
    }

    fn resolve_export_specifier(&self, file: &SourceFile, spec: Node, node: Node) -> Result<Option<SymbolId>> {
        if spec.child_by_field_name("name") != Some(node) {
            return Ok(None);
        }
        let Some(statement) = locator::find_ascendant_of_kind(spec, SyntaxKind::ExportStatement, false) else {
            return Ok(None);
        };
        let name = file.node_text(node);
        match statement.child_by_field_name("source") {
            Some(source) => {
                let specifier = file.node_text(source).trim_matches(|c| c == '"' || c == '\'');
                match self.resolve_module(&file.path, specifier) {
                    Some(target) => self.resolve_export(&target, name),
                    None => Ok(None),
                }
            }
            None => self.resolve_top_level_name(file, name),
        }
    }

    /// `this.m` inside a class body resolves to the class member `m`.
    fn resolve_member_at(&self, file: &SourceFile, node: Node) -> Option<SymbolId> {
        let member = node.parent()?;
        if SyntaxKind::of(member) != SyntaxKind::MemberExpression {
            return None;
        }
        let object = member.child_by_field_name("object")?;
        if SyntaxKind::of(object) != SyntaxKind::This {
            return None;
        }
        let class = locator::find_ascendant(
            member,
            |n| matches!(SyntaxKind::of(n), SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration),
            false,
        )?;
        member_symbol(file, class, file.node_text(node))
    }

    /// Symbol at a cursor offset: a declaration name or a reference to one.
    pub fn symbol_at(&self, file: &SourceFile, offset: usize) -> Result<SymbolId> {
        let node = locator::find_containing(file.root(), offset..offset)
            .ok_or_else(|| RefactorError::resolution(format!("node at offset {}", offset)))?;
        if let Some(symbol) = self.member_declaration_symbol(file, node) {
            return Ok(symbol);
        }
        self.resolve_name_at(file, node)?
            .ok_or_else(|| RefactorError::resolution(format!("symbol `{}`", file.node_text(node))))
    }

    /// A method name at its declaration inside a class or interface.
    fn member_declaration_symbol(&self, file: &SourceFile, node: Node) -> Option<SymbolId> {
        if SyntaxKind::of(node) != SyntaxKind::PropertyIdentifier {
            return None;
        }
        let member = node.parent()?;
        if !matches!(
            SyntaxKind::of(member),
            SyntaxKind::MethodDefinition | SyntaxKind::MethodSignature | SyntaxKind::AbstractMethodSignature
        ) {
            return None;
        }
        let container = locator::find_ascendant(
            member,
            |n| {
                matches!(
                    SyntaxKind::of(n),
                    SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration | SyntaxKind::InterfaceDeclaration
                )
            },
            false,
        )?;
        member_symbol(file, container, file.node_text(node))
    }

    /// Import declarations of `file` whose specifier resolves to `target`.
    pub fn imports_of(&self, file: &SourceFile, target: &Path) -> Vec<ImportDecl> {
        imports::extract_imports(file)
            .into_iter()
            .filter(|i| self.resolve_module(&file.path, &i.specifier).as_deref() == Some(target))
            .collect()
    }
}

/// `Class.member` symbol: the first member declaration with that name.
pub fn member_symbol(file: &SourceFile, container: Node, member: &str) -> Option<SymbolId> {
    let container_name = container.child_by_field_name("name")?;
    let body = container.child_by_field_name("body")?;
    let decl = syntax::named_children(body).into_iter().find(|m| {
        matches!(
            SyntaxKind::of(*m),
            SyntaxKind::MethodDefinition | SyntaxKind::MethodSignature | SyntaxKind::AbstractMethodSignature
        ) && m.child_by_field_name("name").map(|n| file.node_text(n)) == Some(member)
    })?;
    let name = decl.child_by_field_name("name")?;
    Some(SymbolId {
        file: file.path.clone(),
        name: format!("{}.{}", file.node_text(container_name), member),
        start: name.start_byte(),
    })
}

fn pattern_binds(pattern: Node, name: &str, source: &str) -> bool {
    let mut found = false;
    syntax::walk_descendants(pattern, &mut |n| {
        if matches!(n.kind(), "identifier" | "shorthand_property_identifier_pattern")
            && syntax::node_text(n, source) == name
        {
            // Default values inside a pattern are expressions, not bindings.
            let in_default = n.parent().is_some_and(|p| {
                p.child_by_field_name("value") == Some(n) || p.child_by_field_name("right") == Some(n)
            });
            if !in_default {
                found = true;
            }
        }
    });
    found
}

fn type_parameters_bind(node: Node, name: &str, source: &str) -> bool {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return false;
    };
    syntax::named_children(params).into_iter().any(|p| {
        p.child_by_field_name("name")
            .is_some_and(|n| syntax::node_text(n, source) == name)
    })
}

fn declarations_bind(statement: Node, name: &str, source: &str) -> bool {
    match SyntaxKind::of(statement) {
        SyntaxKind::LexicalDeclaration | SyntaxKind::VariableDeclaration => syntax::named_children(statement)
            .into_iter()
            .filter_map(|d| d.child_by_field_name("name"))
            .any(|pattern| pattern_binds(pattern, name, source)),
        SyntaxKind::FunctionDeclaration
        | SyntaxKind::GeneratorFunctionDeclaration
        | SyntaxKind::ClassDeclaration
        | SyntaxKind::AbstractClassDeclaration
        | SyntaxKind::EnumDeclaration => statement
            .child_by_field_name("name")
            .is_some_and(|n| syntax::node_text(n, source) == name),
        _ => false,
    }
}

/// Whether `scope` introduces a local binding named `name`.
fn scope_binds(scope: Node, name: &str, source: &str, is_type: bool) -> bool {
    let kind = SyntaxKind::of(scope);
    if is_type {
        return match kind {
            SyntaxKind::InterfaceDeclaration | SyntaxKind::TypeAliasDeclaration => {
                type_parameters_bind(scope, name, source)
            }
            k if k.is_function_like() || matches!(k, SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration) => {
                type_parameters_bind(scope, name, source)
            }
            _ => false,
        };
    }
    if kind.is_function_like() {
        return syntax::parameters_of(scope).is_some_and(|params| {
            params.into_iter().any(|p| {
                let pattern = p.child_by_field_name("pattern").unwrap_or(p);
                pattern_binds(pattern, name, source)
            })
        });
    }
    match kind {
        SyntaxKind::StatementBlock => syntax::named_children(scope)
            .into_iter()
            .any(|s| declarations_bind(s, name, source)),
        _ => match scope.kind() {
            "for_statement" => scope
                .child_by_field_name("initializer")
                .is_some_and(|init| declarations_bind(init, name, source)),
            "for_in_statement" => scope
                .child_by_field_name("left")
                .is_some_and(|left| pattern_binds(left, name, source)),
            "catch_clause" => scope
                .child_by_field_name("parameter")
                .is_some_and(|param| pattern_binds(param, name, source)),
            "switch_body" => syntax::named_children(scope).into_iter().any(|case| {
                syntax::named_children(case)
                    .into_iter()
                    .any(|s| declarations_bind(s, name, source))
            }),
            _ => false,
        },
    }
}

/// Whether `file` already has a default export of any form.
pub fn has_default_export(file: &SourceFile) -> bool {
    if file.declarations.iter().any(|d| d.default_export) {
        return true;
    }
    let default_statement = syntax::named_children(file.root())
        .into_iter()
        .any(|s| SyntaxKind::of(s) == SyntaxKind::ExportStatement && syntax::has_token(s, "default"));
    default_statement
        || imports::extract_local_exports(file)
            .iter()
            .any(|b| b.local() == "default")
}

/// Lexically resolves `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn strip_ts_extension(path: &str) -> &str {
    for ext in [".d.ts", ".tsx", ".ts"] {
        if let Some(stripped) = path.strip_suffix(ext) {
            return stripped;
        }
    }
    path
}

/// Module specifier that imports `to` from a file at `from`, e.g. `"../food/Food"`.
pub fn relative_module_specifier(from: &Path, to: &Path) -> String {
    let from_dir = normalize_path(from.parent().unwrap_or_else(|| Path::new("/")));
    let to = normalize_path(to);
    let from_parts: Vec<Component> = from_dir.components().collect();
    let to_parts: Vec<Component> = to.components().collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        segments.push("..".to_string());
    }
    for part in &to_parts[common..] {
        segments.push(part.as_os_str().to_string_lossy().to_string());
    }
    let joined = segments.join("/");
    let joined = strip_ts_extension(&joined).to_string();
    if joined.starts_with("../") {
        joined
    } else {
        format!("./{}", joined)
    }
}
