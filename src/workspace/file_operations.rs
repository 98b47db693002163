//! File and folder moves for the TypeScript workspace.
//!
//! A move renames the file (or folder) and rewrites every relative module
//! specifier whose resolution changes: imports of the moved files from the
//! rest of the program and the moved files' own relative imports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::types::{FileMoveResult, LastMove, MoveKind};
use super::Workspace;
use crate::edits::{self, EditBatch};
use crate::error::{RefactorError, Result};
use crate::imports;
use crate::program::{self, Program};

fn conflict(file: &Path, reason: impl Into<String>) -> RefactorError {
    RefactorError::ConflictingDestination {
        file: file.to_path_buf(),
        reason: reason.into(),
    }
}

/// Where `source` lands when moved to `destination` (relative to `base_dir`).
/// An existing directory receives the source under its own name; existing
/// files are never overwritten and missing parent folders are never created.
pub fn resolve_move_target(base_dir: &Path, source: &Path, destination: &str) -> Result<PathBuf> {
    let dest = if Path::new(destination).is_absolute() {
        program::normalize_path(Path::new(destination))
    } else {
        program::normalize_path(&base_dir.join(destination))
    };
    let name = source
        .file_name()
        .ok_or_else(|| RefactorError::resolution(format!("file name of {}", source.display())))?;

    let target = if dest.is_dir() {
        dest.join(name)
    } else if source.is_file() && dest.extension().is_none() {
        // `moveThisFileTo('../x/renamed')` keeps the extension.
        match source.extension() {
            Some(ext) => dest.with_extension(ext),
            None => dest,
        }
    } else {
        dest
    };

    if target.exists() {
        return Err(conflict(&target, "already exists - not overwriting"));
    }
    match target.parent() {
        Some(parent) if parent.is_dir() => Ok(target),
        _ => Err(conflict(&target, "parent folder does not exist - folders are not created")),
    }
}

/// Specifier for `target` written from `from`, in the style of `original`:
/// directory imports stay directory imports and `.js` suffixes are kept.
fn restyle_specifier(original: &str, from: &Path, target: &Path) -> String {
    let trimmed = original.trim_end_matches('/');
    let explicit_js = trimmed.ends_with(".js");
    let stem = trimmed.trim_end_matches(".js");
    let is_index = target
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("index."));
    let points_at_dir = is_index && !stem.ends_with("index");

    let mut specifier = match (points_at_dir, target.parent()) {
        (true, Some(dir)) => {
            let spec = program::relative_module_specifier(from, &dir.join("__dir__"));
            spec.trim_end_matches("/__dir__").to_string()
        }
        _ => program::relative_module_specifier(from, target),
    };
    if explicit_js {
        specifier.push_str(".js");
    }
    specifier
}

/// Rewrites relative specifiers for a set of moved files (old path -> new
/// path). Edits are keyed by the files' current paths.
pub fn plan_moves(program: &Program, moves: &BTreeMap<PathBuf, PathBuf>) -> Result<(EditBatch, usize)> {
    let mut batch = EditBatch::new();
    let mut files_updated = 0;

    for file in program.files() {
        let from_new = moves.get(&file.path).unwrap_or(&file.path);
        let file_moved = moves.contains_key(&file.path);

        let mut specifiers: Vec<(String, std::ops::Range<usize>)> = imports::extract_imports(file)
            .into_iter()
            .map(|i| (i.specifier, i.specifier_range))
            .collect();
        specifiers.extend(
            imports::extract_reexports(file)
                .into_iter()
                .map(|r| (r.specifier, r.specifier_range)),
        );

        let mut changed = false;
        for (specifier, range) in specifiers {
            if !imports::is_relative_specifier(&specifier) {
                continue;
            }
            let Some(target) = program.resolve_module(&file.path, &specifier) else {
                tracing::debug!("{}: unresolved specifier {} left unchanged", file.path.display(), specifier);
                continue;
            };
            let target_new = moves.get(&target).unwrap_or(&target);
            if !file_moved && !moves.contains_key(&target) {
                continue;
            }
            let rewritten = restyle_specifier(&specifier, from_new, target_new);
            if rewritten != specifier {
                batch.push(edits::build(&file.path, rewritten, range.start, range.end - range.start));
                changed = true;
            }
        }
        if changed {
            files_updated += 1;
        }
    }
    Ok((batch, files_updated))
}

fn finish_move(program: &Program, kind: MoveKind, source: PathBuf, target: PathBuf) -> Result<FileMoveResult> {
    let moves: BTreeMap<PathBuf, PathBuf> = match kind {
        MoveKind::File => [(source.clone(), target.clone())].into_iter().collect(),
        MoveKind::Folder => program
            .files()
            .filter_map(|f| {
                let rest = f.path.strip_prefix(&source).ok()?;
                Some((f.path.clone(), target.join(rest)))
            })
            .collect(),
    };
    let (mut batch, files_updated) = plan_moves(program, &moves)?;
    batch.rename_file(source.clone(), target.clone());
    batch.validate(program)?;

    tracing::info!(
        "Planned {:?} move {} -> {} ({} files updated)",
        kind,
        source.display(),
        target.display(),
        files_updated
    );
    Ok(FileMoveResult {
        last_move: LastMove {
            kind,
            source: source.clone(),
            dest: target.clone(),
        },
        old_path: source,
        new_path: target,
        files_updated,
        batch,
    })
}

/// Moves `file` to `destination`, relative to the file's directory.
pub fn move_file(program: &Program, file: &Path, destination: &str) -> Result<FileMoveResult> {
    program.require_file(file)?;
    let dir = file.parent().unwrap_or_else(|| Path::new("/"));
    let target = resolve_move_target(dir, file, destination)?;
    finish_move(program, MoveKind::File, file.to_path_buf(), target)
}

/// Moves the folder containing `file` to `destination`, relative to the file's directory.
pub fn move_folder(program: &Program, file: &Path, destination: &str) -> Result<FileMoveResult> {
    program.require_file(file)?;
    let folder = file
        .parent()
        .ok_or_else(|| RefactorError::resolution(format!("folder of {}", file.display())))?;
    let target = resolve_move_target(folder, folder, destination)?;
    if target.starts_with(folder) {
        return Err(conflict(&target, "a folder cannot be moved into itself"));
    }
    finish_move(program, MoveKind::Folder, folder.to_path_buf(), target)
}

/// Moves the last moved file or folder back where it came from.
pub fn undo_move(program: &Program, last: &LastMove) -> Result<FileMoveResult> {
    let back = last.reversed();
    if back.dest.exists() {
        return Err(conflict(&back.dest, "already exists - not overwriting"));
    }
    if back.kind == MoveKind::File {
        program.require_file(&back.source)?;
    }
    finish_move(program, back.kind, back.source, back.dest)
}

impl Workspace {
    /// Move a file and update every import affected by the new location
    pub fn move_file(&self, file: &Path, destination: &str) -> anyhow::Result<FileMoveResult> {
        Ok(move_file(&self.program, file, destination)?)
    }

    /// Move the folder containing `file` and update every affected import
    pub fn move_folder(&self, file: &Path, destination: &str) -> anyhow::Result<FileMoveResult> {
        Ok(move_folder(&self.program, file, destination)?)
    }

    pub fn undo_move(&self, last: &LastMove) -> anyhow::Result<FileMoveResult> {
        Ok(undo_move(&self.program, last)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> (TempDir, Program) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = [
            ("src/a.ts", "import { b } from './b'\nexport const a = b\n"),
            ("src/b.ts", "export const b = 1\n"),
            ("src/lib/index.ts", "import { b } from '../b.js'\nexport const l = b\n"),
            ("src/c.ts", "import { a } from './a'\nimport { l } from './lib'\nexport * from './a'\n"),
        ];
        for (path, text) in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, text).unwrap();
        }
        fs::create_dir_all(root.join("other")).unwrap();
        let program = Program::from_sources(files.iter().map(|(p, t)| (root.join(p), t.to_string())));
        (temp_dir, program)
    }

    #[test]
    fn test_move_file_rewrites_both_directions() {
        let (temp_dir, program) = create_test_project();
        let root = temp_dir.path();
        let a = root.join("src/a.ts");

        let result = move_file(&program, &a, "../other").unwrap();
        assert_eq!(result.new_path, root.join("other/a.ts"));
        assert_eq!(result.files_updated, 2);
        assert_eq!(result.last_move.kind, MoveKind::File);

        let out = result.batch.apply(&program).unwrap();
        assert_eq!(out[&a], "import { b } from '../src/b'\nexport const a = b\n");
        assert_eq!(
            out[&root.join("src/c.ts")],
            "import { a } from '../other/a'\nimport { l } from './lib'\nexport * from '../other/a'\n"
        );
        assert!(matches!(
            result.batch.file_operations(),
            [edits::FileOperation::Rename { to, .. }] if to == &root.join("other/a.ts")
        ));
    }

    #[test]
    fn test_move_folder_keeps_directory_and_js_styles() {
        let (temp_dir, program) = create_test_project();
        let root = temp_dir.path();
        let index = root.join("src/lib/index.ts");

        let result = move_folder(&program, &index, "../../other").unwrap();
        assert_eq!(result.new_path, root.join("other/lib"));
        let out = result.batch.apply(&program).unwrap();
        assert_eq!(out[&index], "import { b } from '../../src/b.js'\nexport const l = b\n");
        assert!(out[&root.join("src/c.ts")].contains("import { l } from '../other/lib'"));
    }

    #[test]
    fn test_move_target_rules() {
        let (temp_dir, program) = create_test_project();
        let root = temp_dir.path();
        let a = root.join("src/a.ts");

        let renamed = move_file(&program, &a, "./renamed").unwrap();
        assert_eq!(renamed.new_path, root.join("src/renamed.ts"));

        let existing = move_file(&program, &a, "./b.ts").unwrap_err();
        assert!(matches!(existing, RefactorError::ConflictingDestination { .. }));
        let no_parent = move_file(&program, &a, "../missing/a.ts").unwrap_err();
        assert!(matches!(no_parent, RefactorError::ConflictingDestination { .. }));
        let into_itself = move_folder(&program, &root.join("src/lib/index.ts"), "./inner").unwrap_err();
        assert!(matches!(into_itself, RefactorError::ConflictingDestination { .. }));
    }

    #[test]
    fn test_undo_moves_back() {
        let (temp_dir, _) = create_test_project();
        let root = temp_dir.path();
        // State after the move was applied.
        fs::rename(root.join("src/a.ts"), root.join("other/a.ts")).unwrap();
        let program = Program::from_sources(vec![
            (root.join("other/a.ts"), "import { b } from '../src/b'\n".to_string()),
            (root.join("src/b.ts"), "export const b = 1\n".to_string()),
            (root.join("src/c.ts"), "import { a } from '../other/a'\n".to_string()),
        ]);
        let last = LastMove {
            kind: MoveKind::File,
            source: root.join("src/a.ts"),
            dest: root.join("other/a.ts"),
        };

        let result = undo_move(&program, &last).unwrap();
        assert_eq!(result.new_path, root.join("src/a.ts"));
        let out = result.batch.apply(&program).unwrap();
        assert_eq!(out[&root.join("other/a.ts")], "import { b } from './b'\n");
        assert_eq!(out[&root.join("src/c.ts")], "import { a } from './a'\n");
        assert_eq!(result.last_move.reversed(), last);
    }
}
