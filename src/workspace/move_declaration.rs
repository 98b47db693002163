//! Moving a top-level declaration to another file.
//!
//! The move runs through the stages of [`MoveStage`] in order. Every stage
//! computes edits against the snapshot the move started from: referencing
//! files get direct edits, while the origin and destination texts are staged
//! in memory and handed back as one minimal replacement each.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use super::types::{MoveResult, MoveStage};
use super::Workspace;
use crate::config::RefactorConfig;
use crate::document::{Declaration, SourceFile};
use crate::edits::{self, EditBatch, Span, TextEdit};
use crate::error::{RefactorError, Result};
use crate::imports::{self, ImportDecl, ImportScratch, NamedBinding};
use crate::locator;
use crate::program::{self, Program, SymbolId};
use crate::references::{self, ReferenceEntry, ReferenceSite};
use crate::syntax::{self, DeclarationKind, SyntaxKind};

/// Destination path for a move: relative paths are taken from the origin's
/// directory and a missing extension defaults to `.ts`.
pub fn resolve_destination(origin: &Path, destination: &str) -> PathBuf {
    let joined = if Path::new(destination).is_absolute() {
        PathBuf::from(destination)
    } else {
        origin.parent().unwrap_or_else(|| Path::new("/")).join(destination)
    };
    let mut path = program::normalize_path(&joined);
    if path.extension().is_none() {
        path.set_extension("ts");
    }
    path
}

/// One moved statement of the declaration group.
struct MovedStatement {
    /// Leading comments through the end of the statement.
    range: Range<usize>,
    statement_start: usize,
    exported: bool,
}

/// A default export of the moved name written apart from its declaration.
enum SeparateDefault {
    /// `export default f1`
    Statement(Range<usize>),
    /// `f1 as default` in a local `export { .. }` clause.
    Clause {
        statement: Range<usize>,
        specifier: Range<usize>,
        only: bool,
    },
}

impl SeparateDefault {
    /// Text whose references to the name leave along with the declaration.
    fn range(&self) -> Range<usize> {
        match self {
            SeparateDefault::Statement(range) => range.clone(),
            SeparateDefault::Clause { specifier, .. } => specifier.clone(),
        }
    }
}

struct MovePlan<'p> {
    program: &'p Program,
    config: &'p RefactorConfig,
    origin: &'p SourceFile,
    destination: PathBuf,
    dest: Option<&'p SourceFile>,
    symbol: SymbolId,
    default_export: bool,
    separate_default: Option<SeparateDefault>,
    /// The lone moved statement takes `export default` in front.
    inline_default: bool,
    /// Reachable as a named export of the origin.
    exported_by_name: bool,
    stage: MoveStage,
    references: Vec<ReferenceEntry>,
    moved: Vec<MovedStatement>,
    /// `export ` added to origin declarations the moved code depends on.
    export_inserts: Vec<TextEdit>,
    import_back: Option<TextEdit>,
    /// Edits of the destination made before the declaration lands there.
    dest_edits: Vec<TextEdit>,
    dest_imports: Vec<ImportDecl>,
    batch: EditBatch,
    files_updated: BTreeSet<PathBuf>,
}

/// Moves the declaration `name` of `origin` to `destination`, creating the
/// destination when it does not exist yet.
pub fn move_declaration(
    program: &Program,
    origin: &Path,
    name: &str,
    destination: &Path,
    config: &RefactorConfig,
    scratch: &mut ImportScratch,
) -> Result<MoveResult> {
    let origin_file = program.require_file(origin)?;
    let group = program.declaration_group(origin_file, name)?;
    let Some(first) = group.first() else {
        return Err(RefactorError::resolution(format!(
            "declaration `{}` in {}",
            name,
            origin.display()
        )));
    };
    if group.iter().any(|d| d.kind == DeclarationKind::Variable) {
        return Err(RefactorError::not_applicable(format!(
            "`{}` is a variable; only functions, classes, interfaces, types and enums can be moved",
            name
        )));
    }
    let symbol = program.declaration_symbol(origin_file, first)?;
    let separate_default = separate_default(origin_file, name);
    let inline_default = separate_default.is_some()
        && group.len() == 1
        && !first.exported
        && matches!(first.kind, DeclarationKind::Function | DeclarationKind::Class);
    let exported_by_name = group.iter().any(|d| d.exported && !d.default_export)
        || imports::extract_local_exports(origin_file)
            .iter()
            .any(|b| b.name == name && b.local() != "default");

    let mut plan = MovePlan {
        program,
        config,
        origin: origin_file,
        destination: destination.to_path_buf(),
        dest: program.file(destination),
        default_export: group.iter().any(|d| d.default_export) || separate_default.is_some(),
        separate_default,
        inline_default,
        exported_by_name,
        symbol,
        stage: MoveStage::Start,
        references: Vec::new(),
        moved: moved_statements(origin_file, &group),
        export_inserts: Vec::new(),
        import_back: None,
        dest_edits: Vec::new(),
        dest_imports: Vec::new(),
        batch: EditBatch::new(),
        files_updated: BTreeSet::new(),
    };
    plan.check_destination()?;
    plan.references = references::find_references(program, &plan.symbol)?;

    plan.copy_imports_to_dest()?;
    plan.advance(MoveStage::ImportsCopiedToDest);

    plan.fix_exports_at_origin();
    plan.advance(MoveStage::ExportsFixedAtOrigin);

    plan.repoint_referencing_files()?;
    plan.advance(MoveStage::ReferencingFilesRepointed);

    let (mut origin_text, mut dest_text) = plan.relocate()?;
    plan.advance(MoveStage::DeclarationRelocated);

    if config.organize_imports {
        origin_text = imports::organize_text(origin, &origin_text, scratch, config.quote)?;
        dest_text = imports::organize_text(destination, &dest_text, scratch, config.quote)?;
    }
    plan.advance(MoveStage::ImportsOrganized);

    plan.finish(origin_text, dest_text)
}

/// Statements of the group in document order, each widened to its leading
/// comments.
fn moved_statements(file: &SourceFile, group: &[&Declaration]) -> Vec<MovedStatement> {
    let mut moved: Vec<MovedStatement> = group
        .iter()
        .map(|decl| {
            let start = top_level_statement(file, &decl.statement_range)
                .map(|node| leading_comments_start(file, node))
                .unwrap_or(decl.statement_range.start);
            MovedStatement {
                range: start..trailing_comment_end(&file.text, decl.statement_range.end),
                statement_start: decl.statement_range.start,
                exported: decl.exported,
            }
        })
        .collect();
    moved.sort_by_key(|m| m.range.start);
    moved.dedup_by_key(|m| m.range.start);
    moved
}

/// End of a comment that shares the statement's last line, or `end` when
/// anything else follows there.
fn trailing_comment_end(text: &str, end: usize) -> usize {
    let rest = &text[end..];
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
    let body = line.trim_start_matches([' ', '\t', ';']);
    let comment_only = body.starts_with("//")
        || (body.starts_with("/*") && body.find("*/").is_some_and(|close| body[close + 2..].trim().is_empty()));
    if comment_only {
        end + line.trim_end().len()
    } else {
        end
    }
}

/// `export default f1` or `export { f1 as default }` at the top level.
fn separate_default(file: &SourceFile, name: &str) -> Option<SeparateDefault> {
    for statement in syntax::named_children(file.root()) {
        if SyntaxKind::of(statement) != SyntaxKind::ExportStatement || statement.child_by_field_name("source").is_some() {
            continue;
        }
        if let Some(value) = statement.child_by_field_name("value") {
            if syntax::has_token(statement, "default")
                && SyntaxKind::of(value) == SyntaxKind::Identifier
                && file.node_text(value) == name
            {
                return Some(SeparateDefault::Statement(statement.byte_range()));
            }
            continue;
        }
        let Some(clause) = syntax::child_of_kind(statement, SyntaxKind::ExportClause) else {
            continue;
        };
        let specs: Vec<Node> = syntax::named_children(clause)
            .into_iter()
            .filter(|n| SyntaxKind::of(*n) == SyntaxKind::ExportSpecifier)
            .collect();
        let field = |spec: &Node, key: &str| spec.child_by_field_name(key).map(|n| file.node_text(n));
        if let Some(spec) = specs
            .iter()
            .find(|spec| field(*spec, "name") == Some(name) && field(*spec, "alias") == Some("default"))
        {
            return Some(SeparateDefault::Clause {
                statement: statement.byte_range(),
                specifier: spec.byte_range(),
                only: specs.len() == 1,
            });
        }
    }
    None
}

fn top_level_statement<'t>(file: &'t SourceFile, range: &Range<usize>) -> Option<Node<'t>> {
    syntax::named_children(file.root())
        .into_iter()
        .find(|node| node.byte_range() == *range)
}

/// Start of the comments directly attached above `statement`: each on its own
/// line, with no blank line in between.
fn leading_comments_start(file: &SourceFile, statement: Node) -> usize {
    let text = file.text.as_str();
    let mut start = statement.start_byte();
    let mut current = statement;
    while let Some(prev) = current.prev_sibling() {
        if SyntaxKind::of(prev) != SyntaxKind::Comment {
            break;
        }
        let gap = &text[prev.end_byte()..start];
        if !gap.trim().is_empty() || gap.matches('\n').count() > 1 {
            break;
        }
        let line_start = text[..prev.start_byte()].rfind('\n').map(|i| i + 1).unwrap_or(0);
        if !text[line_start..prev.start_byte()].trim().is_empty() {
            break;
        }
        start = prev.start_byte();
        current = prev;
    }
    start
}

fn span_within(span: &Span, range: &Range<usize>) -> bool {
    range.start <= span.start && span.end() <= range.end
}

impl<'p> MovePlan<'p> {
    fn name(&self) -> &str {
        &self.symbol.name
    }

    fn advance(&mut self, to: MoveStage) {
        debug_assert_eq!(self.stage.next(), Some(to));
        tracing::debug!("move {}: {:?} -> {:?}", self.symbol.name, self.stage, to);
        self.stage = to;
    }

    fn conflict(&self, reason: String) -> RefactorError {
        RefactorError::ConflictingDestination {
            file: self.destination.clone(),
            reason,
        }
    }

    fn check_destination(&self) -> Result<()> {
        if self.destination == self.origin.path {
            return Err(self.conflict("destination is the origin file".to_string()));
        }
        let Some(dest) = self.dest else {
            return Ok(());
        };
        if dest.declarations_named(self.name()).next().is_some() {
            return Err(self.conflict(format!("already declares `{}`", self.name())));
        }
        if self.default_export && program::has_default_export(dest) {
            return Err(self.conflict("already has a default export".to_string()));
        }
        let imports_name = imports::extract_imports(dest)
            .iter()
            .any(|import| import.locals().contains(&self.name()));
        if imports_name && self.program.resolve_top_level_name(dest, self.name())?.as_ref() != Some(&self.symbol) {
            return Err(self.conflict(format!("imports a different `{}`", self.name())));
        }
        Ok(())
    }

    fn moved_nodes(&self) -> Vec<Node<'p>> {
        let origin: &'p SourceFile = self.origin;
        self.moved
            .iter()
            .filter_map(|m| {
                syntax::named_children(origin.root())
                    .into_iter()
                    .find(|node| node.start_byte() == m.statement_start)
            })
            .collect()
    }

    fn removal_ranges(&self) -> Vec<Range<usize>> {
        self.moved
            .iter()
            .map(|m| edits::line_extent(&self.origin.text, m.range.clone()))
            .collect()
    }

    /// Names already bound at the top level of the destination.
    fn dest_locals(&self) -> HashSet<String> {
        let Some(dest) = self.dest else {
            return HashSet::new();
        };
        let mut locals: HashSet<String> = dest.declarations.iter().map(|d| d.name.clone()).collect();
        for import in imports::extract_imports(dest) {
            locals.extend(import.locals().into_iter().map(str::to_string));
        }
        locals
    }

    /// Imports the moved code depends on, re-targeted for the destination,
    /// plus imports of origin declarations it uses (exported on the way).
    fn copy_imports_to_dest(&mut self) -> Result<()> {
        let mut names: Vec<Node<'p>> = Vec::new();
        for node in self.moved_nodes() {
            syntax::walk_descendants(node, &mut |n| {
                if SyntaxKind::of(n).is_binding_reference() {
                    names.push(n);
                }
            });
        }
        let used: HashSet<String> = names.iter().map(|n| self.origin.node_text(*n).to_string()).collect();
        let dest_locals = self.dest_locals();
        let wanted = |local: &str| used.contains(local) && !dest_locals.contains(local);

        for import in imports::extract_imports(self.origin) {
            if import.is_side_effect() {
                continue;
            }
            let resolved = self.program.resolve_module(&self.origin.path, &import.specifier);
            if resolved.as_deref() == Some(self.destination.as_path()) {
                continue;
            }
            let mut copy = import.clone();
            copy.default = copy.default.filter(|d| wanted(d.as_str()));
            copy.namespace = copy.namespace.filter(|n| wanted(n.as_str()));
            copy.named.retain(|b| wanted(b.local()));
            if copy.is_side_effect() {
                continue;
            }
            if import.is_relative() {
                let target =
                    resolved.unwrap_or_else(|| program::normalize_path(&self.origin.dir().join(&import.specifier)));
                copy.specifier = program::relative_module_specifier(&self.destination, &target);
            }
            self.dest_imports.push(copy);
        }

        let mut siblings: BTreeSet<SymbolId> = BTreeSet::new();
        for node in &names {
            if let Some(resolved) = self.program.resolve_name_at(self.origin, *node)? {
                if resolved.file == self.origin.path && resolved != self.symbol && !resolved.name.contains('.') {
                    siblings.insert(resolved);
                }
            }
        }

        let mut sibling_import = ImportDecl::new(program::relative_module_specifier(
            &self.destination,
            &self.origin.path,
        ));
        let mut export_at: BTreeSet<usize> = BTreeSet::new();
        for sibling in &siblings {
            let decls = self.program.declarations_of(sibling);
            let Some(first) = decls.first() else {
                continue;
            };
            if dest_locals.contains(&sibling.name) {
                continue;
            }
            if !first.exported {
                export_at.extend(decls.iter().map(|d| d.statement_range.start));
            }
            if first.default_export {
                sibling_import.default = Some(sibling.name.clone());
            } else {
                sibling_import.named.push(NamedBinding::new(sibling.name.clone(), None));
            }
        }
        for start in export_at {
            self.export_inserts.push(edits::insert(&self.origin.path, "export ", start));
        }
        if !sibling_import.is_side_effect() {
            self.dest_imports.push(sibling_import);
        }
        Ok(())
    }

    /// Imports the moved declaration back into the origin when code left
    /// behind still uses it.
    fn fix_exports_at_origin(&mut self) {
        let mut removals = self.removal_ranges();
        removals.extend(self.separate_default.as_ref().map(SeparateDefault::range));
        let still_used = self.references.iter().any(|r| {
            r.file == self.origin.path && !r.is_definition && !removals.iter().any(|range| span_within(&r.span, range))
        });
        if !still_used {
            return;
        }
        let specifier = program::relative_module_specifier(&self.origin.path, &self.destination);
        let import = if self.default_export {
            ImportDecl::new(specifier).with_default(self.name())
        } else {
            ImportDecl::new(specifier).with_named(NamedBinding::new(self.name(), None))
        };
        let text = import.render(self.config.quote);
        self.import_back = Some(match imports::extract_imports(self.origin).last() {
            Some(last) => edits::insert(&self.origin.path, format!("\n{}", text), last.range.end),
            None => edits::insert(&self.origin.path, format!("{}\n", text), 0),
        });
    }

    /// Rewrites imports and re-exports of the symbol in every other file.
    fn repoint_referencing_files(&mut self) -> Result<()> {
        let mut by_file: BTreeMap<PathBuf, Vec<Span>> = BTreeMap::new();
        for reference in &self.references {
            if reference.file != self.origin.path && matches!(reference.site, ReferenceSite::Import | ReferenceSite::Export)
            {
                by_file.entry(reference.file.clone()).or_default().push(reference.span);
            }
        }
        self.repoint_indirect_consumers();

        for (path, spans) in by_file {
            let file = self.program.require_file(&path)?;
            let is_dest = path == self.destination;
            let mut file_edits = Vec::new();
            let hit = |range: &Range<usize>| spans.iter().any(|s| span_within(s, range));

            for import in self.program.imports_of(file, &self.origin.path) {
                let default_hit = import.default_range.as_ref().is_some_and(|r| hit(r));
                let named_hits: Vec<NamedBinding> = import.named.iter().filter(|b| hit(&b.range)).cloned().collect();
                if !default_hit && named_hits.is_empty() {
                    continue;
                }
                let whole = import.namespace.is_none()
                    && (import.default.is_none() || default_hit)
                    && named_hits.len() == import.named.len();

                if is_dest {
                    let mut locals: Vec<String> = named_hits.iter().map(|b| b.local().to_string()).collect();
                    if default_hit {
                        locals.extend(import.default.clone());
                    }
                    file_edits.extend(self.rename_locals_in_dest(file, &locals));
                    if whole {
                        file_edits.push(edits::delete(&path, edits::line_extent(&file.text, import.range.clone())));
                    } else {
                        file_edits.extend(remove_import_bindings(file, &import.range, default_hit, &hit));
                    }
                    continue;
                }

                let specifier = program::relative_module_specifier(&path, &self.destination);
                if whole {
                    file_edits.push(replace_specifier(&path, &import.specifier_range, &specifier));
                } else {
                    file_edits.extend(remove_import_bindings(file, &import.range, default_hit, &hit));
                    let mut isolated = ImportDecl::new(specifier);
                    isolated.type_only = import.type_only;
                    if default_hit {
                        isolated.default = import.default.clone();
                    }
                    isolated.named = named_hits;
                    file_edits.push(edits::insert(
                        &path,
                        format!("\n{}", isolated.render(self.config.quote)),
                        import.range.end,
                    ));
                }
            }

            for reexport in imports::extract_reexports(file) {
                if reexport.star
                    || self.program.resolve_module(&path, &reexport.specifier).as_deref() != Some(self.origin.path.as_path())
                {
                    continue;
                }
                let hits: Vec<&NamedBinding> = reexport.named.iter().filter(|b| hit(&b.range)).collect();
                if hits.is_empty() {
                    continue;
                }
                let whole = hits.len() == reexport.named.len();
                if is_dest {
                    // The declaration is exported where it lands; only renamed exports survive.
                    if whole {
                        file_edits.push(edits::delete(&path, edits::line_extent(&file.text, reexport.range.clone())));
                    } else {
                        file_edits.extend(remaining_export_clause(file, &reexport.range, &hit));
                    }
                    let renamed: Vec<String> = hits
                        .iter()
                        .filter(|b| b.local() != self.name())
                        .map(|b| b.render())
                        .collect();
                    if !renamed.is_empty() {
                        file_edits.push(edits::insert(
                            &path,
                            format!("\nexport {{ {} }};", renamed.join(", ")),
                            reexport.range.end,
                        ));
                    }
                    continue;
                }

                let specifier = program::relative_module_specifier(&path, &self.destination);
                if whole {
                    file_edits.push(replace_specifier(&path, &reexport.specifier_range, &specifier));
                } else {
                    file_edits.extend(remaining_export_clause(file, &reexport.range, &hit));
                    let q = self.config.quote.as_char();
                    let names: Vec<String> = hits.iter().map(|b| b.render()).collect();
                    file_edits.push(edits::insert(
                        &path,
                        format!("\nexport {{ {} }} from {}{}{};", names.join(", "), q, specifier, q),
                        reexport.range.end,
                    ));
                }
            }

            if is_dest {
                self.dest_edits.extend(file_edits);
            } else if !file_edits.is_empty() {
                self.files_updated.insert(path.clone());
                self.batch.extend(file_edits);
            }
        }
        Ok(())
    }

    /// Star re-exports of the origin gain an explicit re-export from the
    /// destination; namespace imports gain a named import and their member
    /// accesses lose the namespace.
    fn repoint_indirect_consumers(&mut self) {
        let program = self.program;
        for file in program.files() {
            if file.path == self.origin.path {
                continue;
            }
            let is_dest = file.path == self.destination;
            let mut file_edits = Vec::new();
            if !is_dest {
                file_edits.extend(self.reexport_from_barrel(file));
            }
            for import in program.imports_of(file, &self.origin.path) {
                if let Some(namespace) = &import.namespace {
                    file_edits.extend(self.rewrite_namespace_uses(file, namespace, &import, is_dest));
                }
            }
            if file_edits.is_empty() {
                continue;
            }
            if is_dest {
                self.dest_edits.extend(file_edits);
            } else {
                self.files_updated.insert(file.path.clone());
                self.batch.extend(file_edits);
            }
        }
    }

    fn reexport_from_barrel(&self, file: &SourceFile) -> Vec<TextEdit> {
        let mut out = Vec::new();
        let reexports = imports::extract_reexports(file);
        let already_named = reexports
            .iter()
            .any(|r| !r.star && r.named.iter().any(|b| b.local() == self.name()));
        for reexport in &reexports {
            if !reexport.star
                || self.program.resolve_module(&file.path, &reexport.specifier).as_deref()
                    != Some(self.origin.path.as_path())
            {
                continue;
            }
            let aliased = top_level_statement(file, &reexport.range)
                .is_some_and(|node| syntax::child_of_kind(node, SyntaxKind::NamespaceExport).is_some());
            if aliased {
                tracing::warn!(
                    "{}: `export * as` from {} no longer includes `{}`",
                    file.path.display(),
                    self.origin.path.display(),
                    self.name()
                );
                continue;
            }
            if !self.exported_by_name || already_named {
                continue;
            }
            let q = self.config.quote.as_char();
            let specifier = program::relative_module_specifier(&file.path, &self.destination);
            out.push(edits::insert(
                &file.path,
                format!("\nexport {{ {} }} from {}{}{};", self.name(), q, specifier, q),
                reexport.range.end,
            ));
        }
        out
    }

    /// `ns.name` becomes a plain name bound by a new named import, aliased
    /// when the file already binds `name`.
    fn rewrite_namespace_uses(
        &self,
        file: &SourceFile,
        namespace: &str,
        import: &ImportDecl,
        is_dest: bool,
    ) -> Vec<TextEdit> {
        let name = self.name();
        let mut uses: Vec<Range<usize>> = Vec::new();
        syntax::walk_descendants(file.root(), &mut |n| {
            let (object, property) = match SyntaxKind::of(n) {
                SyntaxKind::MemberExpression => (n.child_by_field_name("object"), n.child_by_field_name("property")),
                SyntaxKind::NestedTypeIdentifier => (n.child_by_field_name("module"), n.child_by_field_name("name")),
                _ => return,
            };
            if let (Some(object), Some(property)) = (object, property) {
                if SyntaxKind::of(object) == SyntaxKind::Identifier
                    && file.node_text(object) == namespace
                    && file.node_text(property) == name
                {
                    uses.push(n.byte_range());
                }
            }
        });
        if uses.is_empty() {
            return Vec::new();
        }

        let bound = file.declarations.iter().any(|d| d.name == name)
            || imports::extract_imports(file).iter().any(|i| i.locals().contains(&name));
        let local = if bound && !is_dest {
            format!("{}_{}", namespace, name)
        } else {
            name.to_string()
        };
        let mut out: Vec<TextEdit> = uses
            .into_iter()
            .map(|range| edits::build(&file.path, local.as_str(), range.start, range.end - range.start))
            .collect();
        if !is_dest {
            let alias = (local != name).then(|| local.clone());
            let mut added = ImportDecl::new(program::relative_module_specifier(&file.path, &self.destination));
            added.named.push(NamedBinding::new(name, alias));
            out.push(edits::insert(
                &file.path,
                format!("\n{}", added.render(self.config.quote)),
                import.range.end,
            ));
        }
        out
    }

    /// Once the declaration lives in the destination, aliases it imported it
    /// under become the declaration's own name.
    fn rename_locals_in_dest(&self, dest: &SourceFile, locals: &[String]) -> Vec<TextEdit> {
        let name = self.name();
        let mut out = Vec::new();
        for reference in &self.references {
            if reference.file != dest.path || reference.site == ReferenceSite::Import {
                continue;
            }
            let range = reference.span.start..reference.span.end();
            let text = &dest.text[range.clone()];
            if text == name || !locals.iter().any(|l| l == text) {
                continue;
            }
            let node = locator::find_exact(dest.root(), range.clone(), None);
            let bare_export = node.and_then(|n| n.parent()).is_some_and(|p| {
                SyntaxKind::of(p) == SyntaxKind::ExportSpecifier && p.child_by_field_name("alias").is_none()
            });
            let replacement = if bare_export {
                format!("{} as {}", name, text)
            } else {
                name.to_string()
            };
            out.push(edits::build(&dest.path, replacement, range.start, range.end - range.start));
        }
        out
    }

    fn declaration_text(&self) -> String {
        let text = &self.origin.text;
        let mut out = self
            .moved
            .iter()
            .map(|m| {
                let leading = &text[m.range.start..m.statement_start];
                let export = match (m.exported, self.inline_default) {
                    (true, _) => "",
                    (false, true) => "export default ",
                    (false, false) => "export ",
                };
                format!("{}{}{}", leading, export, &text[m.statement_start..m.range.end])
            })
            .collect::<Vec<_>>()
            .join("\n");
        if self.separate_default.is_some() && !self.inline_default {
            out.push_str(&format!("\nexport default {};", self.name()));
        }
        out
    }

    /// Removal of the origin's separate default export, if there is one.
    fn separate_default_removal(&self) -> Option<TextEdit> {
        let path = &self.origin.path;
        match self.separate_default.as_ref()? {
            SeparateDefault::Statement(range) | SeparateDefault::Clause { statement: range, only: true, .. } => {
                Some(edits::delete(path, edits::line_extent(&self.origin.text, range.clone())))
            }
            SeparateDefault::Clause { statement, specifier, .. } => {
                remaining_export_clause(self.origin, statement, &|r: &Range<usize>| r == specifier)
            }
        }
    }

    /// Stages the origin with the declaration removed and the destination
    /// with it added.
    fn relocate(&self) -> Result<(String, String)> {
        let origin_path = &self.origin.path;
        let mut origin_edits: Vec<TextEdit> = self.import_back.iter().cloned().collect();
        origin_edits.extend(self.export_inserts.iter().cloned());
        origin_edits.extend(self.removal_ranges().into_iter().map(|r| edits::delete(origin_path, r)));
        origin_edits.extend(self.separate_default_removal());
        let origin_text = edits::apply_edits(origin_path, &self.origin.text, &origin_edits)?;

        let import_lines: Vec<String> = self.dest_imports.iter().map(|i| i.render(self.config.quote)).collect();
        let declaration = self.declaration_text();
        let dest_text = match self.dest {
            Some(dest) => {
                let staged = edits::apply_edits(&dest.path, &dest.text, &self.dest_edits)?;
                let staged_file = SourceFile::parse(&dest.path, staged.as_str())
                    .ok_or_else(|| RefactorError::resolution(format!("parse of {}", dest.path.display())))?;
                match imports::extract_imports(&staged_file).last() {
                    Some(last) => {
                        let at = last.range.end;
                        let mut insertion = String::new();
                        for line in &import_lines {
                            insertion.push('\n');
                            insertion.push_str(line);
                        }
                        insertion.push_str("\n\n");
                        insertion.push_str(&declaration);
                        format!("{}{}{}", &staged[..at], insertion, &staged[at..])
                    }
                    None => prepend(&import_lines, &declaration, &staged),
                }
            }
            None => prepend(&import_lines, &declaration, ""),
        };
        Ok((origin_text, dest_text))
    }

    fn finish(mut self, origin_text: String, dest_text: String) -> Result<MoveResult> {
        // An origin left with nothing but blank lines becomes empty.
        let origin_text = if origin_text.trim().is_empty() {
            String::new()
        } else {
            origin_text
        };
        if let Some(edit) = edits::replace_minimal(&self.origin.path, &self.origin.text, &origin_text) {
            self.batch.push(edit);
        }
        match self.dest {
            Some(dest) => {
                if let Some(edit) = edits::replace_minimal(&dest.path, &dest.text, &dest_text) {
                    self.batch.push(edit);
                }
            }
            None => self.batch.create_file(self.destination.clone(), dest_text),
        }
        self.batch.validate(self.program)?;
        self.advance(MoveStage::Done);

        Ok(MoveResult {
            batch: self.batch,
            stage: self.stage,
            declaration_name: self.symbol.name.clone(),
            origin: self.origin.path.clone(),
            destination: self.destination,
            references_updated: self.files_updated.len(),
        })
    }
}

fn prepend(import_lines: &[String], declaration: &str, rest: &str) -> String {
    let mut out = String::new();
    if !import_lines.is_empty() {
        out.push_str(&import_lines.join("\n"));
        out.push_str("\n\n");
    }
    out.push_str(declaration);
    let rest = rest.trim_start();
    if rest.is_empty() {
        out.push('\n');
    } else {
        out.push_str("\n\n");
        out.push_str(rest);
    }
    out
}

fn replace_specifier(path: &Path, range: &Range<usize>, specifier: &str) -> TextEdit {
    edits::build(path, specifier, range.start, range.end - range.start)
}

/// `{ a, b }` with the hit specifiers left out; `None` when nothing is hit.
fn braced_remaining(file: &SourceFile, list: Node, hit: &dyn Fn(&Range<usize>) -> bool) -> Option<Vec<String>> {
    let specs: Vec<Node> = syntax::named_children(list)
        .into_iter()
        .filter(|n| matches!(SyntaxKind::of(*n), SyntaxKind::ImportSpecifier | SyntaxKind::ExportSpecifier))
        .collect();
    let remaining: Vec<String> = specs
        .iter()
        .filter(|s| !hit(&s.byte_range()))
        .map(|s| file.node_text(*s).to_string())
        .collect();
    (remaining.len() != specs.len()).then_some(remaining)
}

/// Edits removing the hit bindings from an import that keeps at least one
/// other binding.
fn remove_import_bindings(
    file: &SourceFile,
    statement: &Range<usize>,
    default_hit: bool,
    hit: &dyn Fn(&Range<usize>) -> bool,
) -> Vec<TextEdit> {
    let mut out = Vec::new();
    let Some(clause) = top_level_statement(file, statement)
        .and_then(|node| syntax::child_of_kind(node, SyntaxKind::ImportClause))
    else {
        return out;
    };
    let parts = syntax::named_children(clause);
    for (i, part) in parts.iter().enumerate() {
        match SyntaxKind::of(*part) {
            SyntaxKind::Identifier if default_hit => {
                if let Some(next) = parts.get(i + 1) {
                    out.push(edits::delete(&file.path, part.start_byte()..next.start_byte()));
                }
            }
            SyntaxKind::NamedImports => match braced_remaining(file, *part, hit) {
                Some(remaining) if remaining.is_empty() => {
                    if let Some(prev) = i.checked_sub(1).and_then(|p| parts.get(p)) {
                        out.push(edits::delete(&file.path, prev.end_byte()..part.end_byte()));
                    }
                }
                Some(remaining) => out.push(edits::build(
                    &file.path,
                    format!("{{ {} }}", remaining.join(", ")),
                    part.start_byte(),
                    part.end_byte() - part.start_byte(),
                )),
                None => {}
            },
            _ => {}
        }
    }
    out
}

/// Rewrites the clause of a re-export to the bindings that are not hit.
fn remaining_export_clause(
    file: &SourceFile,
    statement: &Range<usize>,
    hit: &dyn Fn(&Range<usize>) -> bool,
) -> Option<TextEdit> {
    let clause =
        top_level_statement(file, statement).and_then(|node| syntax::child_of_kind(node, SyntaxKind::ExportClause))?;
    let remaining = braced_remaining(file, clause, hit)?;
    Some(edits::build(
        &file.path,
        format!("{{ {} }}", remaining.join(", ")),
        clause.start_byte(),
        clause.end_byte() - clause.start_byte(),
    ))
}

impl Workspace {
    /// Move a top-level declaration to another file.
    /// `destination` is relative to the origin file's directory.
    pub fn move_declaration(&self, origin: &Path, name: &str, destination: &str) -> anyhow::Result<MoveResult> {
        let destination = resolve_destination(origin, destination);
        let mut scratch = ImportScratch::new();
        let result = move_declaration(&self.program, origin, name, &destination, &self.config, &mut scratch)?;
        tracing::info!(
            "Moved {} from {} to {} ({} referencing files updated)",
            result.declaration_name,
            result.origin.display(),
            result.destination.display(),
            result.references_updated
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(files: &[(&str, &str)]) -> Program {
        Program::from_sources(files.iter().map(|(p, t)| (PathBuf::from(p), t.to_string())))
    }

    fn run(program: &Program, origin: &str, name: &str, destination: &str) -> Result<BTreeMap<PathBuf, String>> {
        let mut scratch = ImportScratch::new();
        let result = move_declaration(
            program,
            Path::new(origin),
            name,
            Path::new(destination),
            &RefactorConfig::default(),
            &mut scratch,
        )?;
        assert_eq!(result.stage, MoveStage::Done);
        result.batch.apply(program)
    }

    fn text<'a>(out: &'a BTreeMap<PathBuf, String>, path: &str) -> &'a str {
        out.get(Path::new(path)).map(String::as_str).unwrap_or_else(|| panic!("{} not edited", path))
    }

    #[test]
    fn test_resolve_destination() {
        let origin = Path::new("/p/src/food/Food.ts");
        assert_eq!(resolve_destination(origin, "../animal/Animal.ts"), PathBuf::from("/p/src/animal/Animal.ts"));
        assert_eq!(resolve_destination(origin, "./dest"), PathBuf::from("/p/src/food/dest.ts"));
        assert_eq!(resolve_destination(origin, "/q/x.tsx"), PathBuf::from("/q/x.tsx"));
    }

    #[test]
    fn test_move_copies_imports_and_imports_back() {
        let p = program(&[
            (
                "/p/f2.ts",
                "import {f1} from 'a-library-f1'\nexport function f2(a:any){ return f3(f1(a)) }\nexport function f3(a:any){}\nexport function f4(a){ return f1(f2(a)) }\n",
            ),
            ("/p/dest.ts", ""),
        ]);
        let out = run(&p, "/p/f2.ts", "f2", "/p/dest.ts").unwrap();
        assert_eq!(
            text(&out, "/p/dest.ts"),
            "import { f1 } from \"a-library-f1\";\nimport { f3 } from \"./f2\";\n\nexport function f2(a:any){ return f3(f1(a)) }\n"
        );
        assert_eq!(
            text(&out, "/p/f2.ts"),
            "import {f1} from 'a-library-f1'\nimport { f2 } from \"./dest\";\nexport function f3(a:any){}\nexport function f4(a){ return f1(f2(a)) }\n"
        );
    }

    #[test]
    fn test_multi_name_import_is_split() {
        let p = program(&[
            ("/p/f1.ts", "export const x = 1\nexport function f1() { return 1 }\nexport const a = 2\n"),
            ("/p/f2.ts", "import { x, f1, a } from './f1'\nconsole.log(x, f1(), a)\n"),
            ("/p/dest.ts", ""),
        ]);
        let out = run(&p, "/p/f1.ts", "f1", "/p/dest.ts").unwrap();
        assert_eq!(
            text(&out, "/p/f2.ts"),
            "import { x, a } from './f1'\nimport { f1 } from \"./dest\";\nconsole.log(x, f1(), a)\n"
        );
        assert_eq!(text(&out, "/p/f1.ts"), "export const x = 1\nexport const a = 2\n");
        assert_eq!(text(&out, "/p/dest.ts"), "export function f1() { return 1 }\n");
    }

    #[test]
    fn test_default_export_moves_to_new_file() {
        let p = program(&[
            ("/p/f1.ts", "export default function f1(a: any) { return a }\nfunction aux() { return f1(1) }\n"),
            ("/p/f2.ts", "import utility1 from './f1'\nutility1(2)\n"),
        ]);
        let mut scratch = ImportScratch::new();
        let result = move_declaration(
            &p,
            Path::new("/p/f1.ts"),
            "f1",
            Path::new("/p/dest.ts"),
            &RefactorConfig::default(),
            &mut scratch,
        )
        .unwrap();
        assert_eq!(result.references_updated, 1);
        assert!(matches!(
            result.batch.file_operations(),
            [edits::FileOperation::Create { path, .. }] if path == Path::new("/p/dest.ts")
        ));

        let out = result.batch.apply(&p).unwrap();
        assert_eq!(text(&out, "/p/f1.ts"), "import f1 from \"./dest\";\nfunction aux() { return f1(1) }\n");
        assert_eq!(text(&out, "/p/f2.ts"), "import utility1 from './dest'\nutility1(2)\n");
        assert_eq!(text(&out, "/p/dest.ts"), "export default function f1(a: any) { return a }\n");
    }

    #[test]
    fn test_aliased_import_keeps_alias() {
        let p = program(&[
            ("/p/f1.ts", "export interface I1 { a: number }\nexport interface I2 extends I1 {}\n"),
            ("/p/f2.ts", "import {I1 as Interface1} from './f1'\nexport interface I3 extends Interface1 {}\n"),
            ("/p/dest.ts", ""),
        ]);
        let out = run(&p, "/p/f1.ts", "I1", "/p/dest.ts").unwrap();
        assert_eq!(
            text(&out, "/p/f1.ts"),
            "import { I1 } from \"./dest\";\nexport interface I2 extends I1 {}\n"
        );
        assert_eq!(
            text(&out, "/p/f2.ts"),
            "import {I1 as Interface1} from './dest'\nexport interface I3 extends Interface1 {}\n"
        );
        assert_eq!(text(&out, "/p/dest.ts"), "export interface I1 { a: number }\n");
    }

    #[test]
    fn test_class_moves_into_file_that_imported_it() {
        let p = program(&[
            ("/p/src/energy/Energy.ts", "export class Energy {}\n"),
            (
                "/p/src/food/Food.ts",
                "import {Energy} from '../energy/Energy'\n\nexport class Food {\n    energy: Energy = new Energy()\n}\n",
            ),
            (
                "/p/src/animal/Animal.ts",
                "import {Food} from '../food/Food'\n\nexport class Animal {\n    eat(food: Food) {}\n}\n",
            ),
            (
                "/p/src/animal/lion/Lion.ts",
                "import {Food} from '../../food/Food'\nimport {Animal} from '../Animal'\n\nexport class Lion extends Animal {\n    eat(food: Food) {}\n}\n",
            ),
        ]);
        let out = run(&p, "/p/src/food/Food.ts", "Food", "/p/src/animal/Animal.ts").unwrap();
        assert_eq!(
            text(&out, "/p/src/animal/Animal.ts"),
            "import { Energy } from \"../energy/Energy\";\n\nexport class Food {\n    energy: Energy = new Energy()\n}\n\nexport class Animal {\n    eat(food: Food) {}\n}\n"
        );
        assert_eq!(text(&out, "/p/src/food/Food.ts"), "");
        assert_eq!(
            text(&out, "/p/src/animal/lion/Lion.ts"),
            "import {Food} from '../Animal'\nimport {Animal} from '../Animal'\n\nexport class Lion extends Animal {\n    eat(food: Food) {}\n}\n"
        );
    }

    #[test]
    fn test_unexported_helper_is_exported_and_comments_move() {
        let p = program(&[(
            "/p/a.ts",
            "function helper() {}\n\n// moves along\nexport function f() { return helper() }\n",
        )]);
        let out = run(&p, "/p/a.ts", "f", "/p/b.ts").unwrap();
        assert_eq!(text(&out, "/p/a.ts"), "export function helper() {}\n\n");
        assert_eq!(
            text(&out, "/p/b.ts"),
            "import { helper } from \"./a\";\n\n// moves along\nexport function f() { return helper() }\n"
        );
    }

    #[test]
    fn test_destination_conflicts() {
        let p = program(&[
            ("/p/a.ts", "export function f() {}\nexport default function g() {}\nexport const v = 1\n"),
            ("/p/b.ts", "export function f() {}\nexport default class D {}\n"),
        ]);
        let same_name = run(&p, "/p/a.ts", "f", "/p/b.ts").unwrap_err();
        assert!(matches!(same_name, RefactorError::ConflictingDestination { .. }));
        let default_clash = run(&p, "/p/a.ts", "g", "/p/b.ts").unwrap_err();
        assert!(matches!(default_clash, RefactorError::ConflictingDestination { .. }));
        let same_file = run(&p, "/p/a.ts", "f", "/p/a.ts").unwrap_err();
        assert!(matches!(same_file, RefactorError::ConflictingDestination { .. }));
        let variable = run(&p, "/p/a.ts", "v", "/p/c.ts").unwrap_err();
        assert!(variable.is_not_applicable());
        let missing = run(&p, "/p/a.ts", "nope", "/p/c.ts").unwrap_err();
        assert!(matches!(missing, RefactorError::ResolutionFailure { .. }));
    }

    #[test]
    fn test_separate_default_export_moves_with_declaration() {
        let p = program(&[
            ("/p/f1.ts", "function f1() { return 1 }\nexport default f1\n"),
            ("/p/use.ts", "import utility1 from './f1'\nutility1()\n"),
        ]);
        let out = run(&p, "/p/f1.ts", "f1", "/p/dest.ts").unwrap();
        assert_eq!(text(&out, "/p/f1.ts"), "");
        assert_eq!(text(&out, "/p/dest.ts"), "export default function f1() { return 1 }\n");
        assert_eq!(text(&out, "/p/use.ts"), "import utility1 from './dest'\nutility1()\n");
    }

    #[test]
    fn test_default_in_export_clause_moves_with_declaration() {
        let p = program(&[
            ("/p/f1.ts", "function f1() { return 1 }\nconst x = 2\nexport { x, f1 as default }\n"),
            ("/p/use.ts", "import one from './f1'\none()\n"),
        ]);
        let out = run(&p, "/p/f1.ts", "f1", "/p/dest.ts").unwrap();
        assert_eq!(text(&out, "/p/f1.ts"), "const x = 2\nexport { x }\n");
        assert_eq!(text(&out, "/p/dest.ts"), "export default function f1() { return 1 }\n");
        assert_eq!(text(&out, "/p/use.ts"), "import one from './dest'\none()\n");
    }

    #[test]
    fn test_separate_default_of_interface_is_kept_apart() {
        let p = program(&[("/p/a.ts", "interface Shape { a: number }\nexport default Shape\n")]);
        let out = run(&p, "/p/a.ts", "Shape", "/p/b.ts").unwrap();
        assert_eq!(text(&out, "/p/a.ts"), "");
        assert_eq!(
            text(&out, "/p/b.ts"),
            "export interface Shape { a: number }\nexport default Shape;\n"
        );
    }

    #[test]
    fn test_star_barrel_reexports_from_destination() {
        let p = program(&[
            ("/p/f1.ts", "export function f1() { return 1 }\nexport const k = 2\n"),
            ("/p/index.ts", "export * from './f1'\n"),
            ("/p/use.ts", "import { f1 } from './index'\nf1()\n"),
        ]);
        let out = run(&p, "/p/f1.ts", "f1", "/p/dest.ts").unwrap();
        assert_eq!(text(&out, "/p/index.ts"), "export * from './f1'\nexport { f1 } from \"./dest\";\n");
        assert!(!out.contains_key(Path::new("/p/use.ts")));

        let after = program(&[
            ("/p/f1.ts", text(&out, "/p/f1.ts")),
            ("/p/index.ts", text(&out, "/p/index.ts")),
            ("/p/dest.ts", text(&out, "/p/dest.ts")),
            ("/p/use.ts", "import { f1 } from './index'\nf1()\n"),
        ]);
        let use_file = after.require_file(Path::new("/p/use.ts")).unwrap();
        let resolved = after.resolve_top_level_name(use_file, "f1").unwrap().unwrap();
        assert_eq!(resolved.file, PathBuf::from("/p/dest.ts"));
    }

    #[test]
    fn test_namespace_members_become_named_imports() {
        let p = program(&[
            ("/p/f1.ts", "export function f1() { return 1 }\nexport interface Shape { a: number }\n"),
            ("/p/use.ts", "import * as lib from './f1'\nconst s: lib.Shape = { a: lib.f1() }\n"),
            ("/p/use2.ts", "import * as lib from './f1'\nfunction f1() {}\nlib.f1()\n"),
        ]);
        let out = run(&p, "/p/f1.ts", "f1", "/p/dest.ts").unwrap();
        assert_eq!(
            text(&out, "/p/use.ts"),
            "import * as lib from './f1'\nimport { f1 } from \"./dest\";\nconst s: lib.Shape = { a: f1() }\n"
        );
        assert_eq!(
            text(&out, "/p/use2.ts"),
            "import * as lib from './f1'\nimport { f1 as lib_f1 } from \"./dest\";\nfunction f1() {}\nlib_f1()\n"
        );

        let out = run(&p, "/p/f1.ts", "Shape", "/p/dest.ts").unwrap();
        assert_eq!(
            text(&out, "/p/use.ts"),
            "import * as lib from './f1'\nimport { Shape } from \"./dest\";\nconst s: Shape = { a: lib.f1() }\n"
        );
        assert!(!out.contains_key(Path::new("/p/use2.ts")));
    }

    #[test]
    fn test_trailing_comment_moves_with_statement() {
        let p = program(&[(
            "/p/a.ts",
            "export function f() { return 1 } // keep with f\nexport const k = 1 // stays\n",
        )]);
        let out = run(&p, "/p/a.ts", "f", "/p/b.ts").unwrap();
        assert_eq!(text(&out, "/p/a.ts"), "export const k = 1 // stays\n");
        assert_eq!(text(&out, "/p/b.ts"), "export function f() { return 1 } // keep with f\n");
        assert_eq!(trailing_comment_end("a(); /* c */ b()\n", 3), 3);
        assert_eq!(trailing_comment_end("a() /* c */\n", 3), 11);
    }
}
