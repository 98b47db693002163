use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp::lsp_types::Url;
use walkdir::WalkDir;

use crate::config::RefactorConfig;
use crate::document::SourceFile;
use crate::program::Program;

mod file_operations;
mod move_declaration;
mod types;

pub use file_operations::{move_file, move_folder, plan_moves, resolve_move_target, undo_move};
pub use move_declaration::{move_declaration, resolve_destination};
pub use types::*;

/// The workspace index - every TypeScript file under the root, parsed
pub struct Workspace {
    pub root_path: PathBuf,
    pub config: RefactorConfig,
    program: Program,
}

fn is_typescript(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "ts" || ext == "tsx")
}

impl Workspace {
    pub fn new(root_path: PathBuf, config: RefactorConfig) -> Self {
        Self {
            root_path,
            config,
            program: Program::new(),
        }
    }

    /// Initialize workspace: apply `tsrefactor.json` if present and index all files
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        if let Some(config) = RefactorConfig::load_from_root(&self.root_path)? {
            tracing::info!("Using {} from {}", crate::config::CONFIG_FILE_NAME, self.root_path.display());
            self.config = config;
        }
        self.config.validate()?;
        self.index_all_files()
    }

    /// A snapshot of the program for one request.
    pub fn program(&self) -> Program {
        self.program.clone()
    }

    pub fn file_count(&self) -> usize {
        self.program.len()
    }

    /// Check if a path is inside an excluded directory
    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root_path).unwrap_or(path);
        relative.components().any(|c| match c {
            std::path::Component::Normal(name) => self.config.exclude.iter().any(|e| name == e.as_str()),
            _ => false,
        })
    }

    fn collect_files(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_typescript(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// Index all .ts/.tsx files in the workspace
    pub fn index_all_files(&mut self) -> anyhow::Result<()> {
        let files_to_index = self.collect_files(&self.root_path);

        tracing::info!("Indexing {} TypeScript files", files_to_index.len());

        for path in files_to_index {
            if let Err(e) = self.index_file(&path) {
                tracing::warn!("Failed to index {:?}: {}", path, e);
            }
        }

        Ok(())
    }

    /// Index a single file
    pub fn index_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)?;
        let file = SourceFile::parse(path, content).ok_or_else(|| anyhow::anyhow!("Failed to parse {:?}", path))?;
        self.program.insert(Arc::new(file));
        Ok(())
    }

    /// Update a file in the index (called on didChange)
    pub fn update_file(&mut self, uri: &Url, content: &str) {
        let path = match uri.to_file_path() {
            Ok(p) => p,
            Err(_) => return,
        };
        if !is_typescript(&path) || self.is_excluded(&path) {
            return;
        }
        match SourceFile::parse(path.as_path(), content) {
            Some(file) => self.program.insert(Arc::new(file)),
            None => tracing::warn!("Failed to parse {:?}", path),
        }
    }

    /// Remove a file from the index
    pub fn remove_file(&mut self, uri: &Url) {
        if let Ok(path) = uri.to_file_path() {
            self.program.remove(&path);
        }
    }

    /// Notify the workspace that a file or folder was renamed/moved
    /// This removes the old files from the index and adds the new ones
    pub fn notify_file_renamed(&mut self, old_path: &Path, new_path: &Path) -> anyhow::Result<()> {
        let stale: Vec<PathBuf> = self
            .program
            .files()
            .filter(|f| f.path.starts_with(old_path))
            .map(|f| f.path.clone())
            .collect();
        for path in stale {
            self.program.remove(&path);
        }

        if new_path.is_dir() {
            for path in self.collect_files(new_path) {
                if let Err(e) = self.index_file(&path) {
                    tracing::warn!("Failed to index {:?}: {}", path, e);
                }
            }
        } else if is_typescript(new_path) {
            self.index_file(new_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_workspace() -> (TempDir, Workspace) {
        let temp_dir = TempDir::new().unwrap();
        let src_dir = temp_dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(temp_dir.path().join("node_modules/lib")).unwrap();

        fs::write(src_dir.join("a.ts"), "import { b } from './b'\nexport function a() { return b() }\n").unwrap();
        fs::write(src_dir.join("b.ts"), "export function b() { return 1 }\n").unwrap();
        fs::write(src_dir.join("notes.md"), "# not indexed\n").unwrap();
        fs::write(temp_dir.path().join("node_modules/lib/index.ts"), "export {}\n").unwrap();

        let mut workspace = Workspace::new(temp_dir.path().to_path_buf(), RefactorConfig::default());
        workspace.initialize().unwrap();

        (temp_dir, workspace)
    }

    #[test]
    fn test_indexes_typescript_and_skips_excluded() {
        let (temp_dir, workspace) = create_test_workspace();
        assert_eq!(workspace.file_count(), 2);
        assert!(workspace.program().contains(&temp_dir.path().join("src/a.ts")));
        assert!(!workspace
            .program()
            .contains(&temp_dir.path().join("node_modules/lib/index.ts")));
    }

    #[test]
    fn test_config_file_overrides_options() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("tsrefactor.json"), r#"{ "markerPrefix": "@@" }"#).unwrap();
        let mut workspace = Workspace::new(temp_dir.path().to_path_buf(), RefactorConfig::default());
        workspace.initialize().unwrap();
        assert_eq!(workspace.config.marker_prefix, "@@");
    }

    #[test]
    fn test_update_and_remove_file() {
        let (temp_dir, mut workspace) = create_test_workspace();
        let path = temp_dir.path().join("src/c.ts");
        let uri = Url::from_file_path(&path).unwrap();

        workspace.update_file(&uri, "export const c = 1\n");
        assert_eq!(workspace.file_count(), 3);
        let snapshot = workspace.program();

        workspace.update_file(&uri, "export const c = 2\n");
        assert_eq!(snapshot.file(&path).unwrap().text, "export const c = 1\n");
        assert_eq!(workspace.program().file(&path).unwrap().text, "export const c = 2\n");

        workspace.remove_file(&uri);
        assert_eq!(workspace.file_count(), 2);
    }

    #[test]
    fn test_move_declaration_through_workspace() {
        let (temp_dir, workspace) = create_test_workspace();
        let a = temp_dir.path().join("src/a.ts");
        let result = workspace.move_declaration(&a, "a", "./util").unwrap();
        assert_eq!(result.destination, temp_dir.path().join("src/util.ts"));
        assert_eq!(result.stage, MoveStage::Done);

        let out = result.batch.apply(&workspace.program()).unwrap();
        assert_eq!(out[&a], "");
        assert_eq!(
            out[&temp_dir.path().join("src/util.ts")],
            "import { b } from \"./b\";\n\nexport function a() { return b() }\n"
        );
    }

    #[test]
    fn test_notify_file_renamed() {
        let (temp_dir, mut workspace) = create_test_workspace();
        let old = temp_dir.path().join("src/b.ts");
        let new = temp_dir.path().join("src/lib/b.ts");
        fs::create_dir_all(new.parent().unwrap()).unwrap();
        fs::rename(&old, &new).unwrap();

        workspace.notify_file_renamed(&old, &new).unwrap();
        let program = workspace.program();
        assert!(!program.contains(&old));
        assert!(program.contains(&new));

        let old_dir = temp_dir.path().join("src/lib");
        let new_dir = temp_dir.path().join("lib");
        fs::rename(&old_dir, &new_dir).unwrap();
        workspace.notify_file_renamed(&old_dir, &new_dir).unwrap();
        assert!(workspace.program().contains(&new_dir.join("b.ts")));
        assert_eq!(workspace.file_count(), 2);
    }
}
