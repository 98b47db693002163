use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::RefactorConfig;
use crate::diagnostics::{self, DiagnosticsProvider, TscDiagnostic};
use crate::document::Document;
use crate::program::Program;
use crate::registry::{ActionArgs, ActionContext, ActionKind, MoveRecord, Registry};
use crate::workspace::{LastMove, Workspace};

// Custom commands
const CMD_APPLY_ACTION: &str = "tsRefactor.applyAction";
const CMD_REORDER_PARAMETERS: &str = "tsRefactor.reorderParameters";
const CMD_MOVE_DECLARATION: &str = "tsRefactor.moveDeclaration";
const CMD_MOVE_FILE: &str = "tsRefactor.moveFile";
const CMD_UNDO_LAST_MOVE: &str = "tsRefactor.undoLastMove";
const CMD_GET_DIAGNOSTICS: &str = "tsRefactor.getDiagnostics";
// Sent back by the client after it applied a resolved code action
const CMD_RECORD_MOVE: &str = "tsRefactor.recordMove";

/// Carried in `CodeAction::data` between `codeAction` and `codeAction/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionData {
    uri: Url,
    range: Range,
    name: String,
    #[serde(default)]
    args: ActionArgs,
}

fn invalid_params(message: impl Into<String>) -> tower_lsp::jsonrpc::Error {
    tower_lsp::jsonrpc::Error::invalid_params(message.into())
}

/// Decodes the `index`-th command argument.
fn arg<T: DeserializeOwned>(arguments: &[serde_json::Value], index: usize, what: &str) -> Result<T> {
    let value = arguments
        .get(index)
        .ok_or_else(|| invalid_params(format!("missing argument {}: {}", index, what)))?;
    serde_json::from_value(value.clone()).map_err(|e| invalid_params(format!("{}: {}", what, e)))
}

fn failure(e: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": e.to_string()
    })
}

/// The follow-up command a resolved action carries when applying it changes
/// the move history.
fn record_move_command(record: &MoveRecord) -> Option<Command> {
    if *record == MoveRecord::Unchanged {
        return None;
    }
    Some(Command {
        title: "Record move".to_string(),
        command: CMD_RECORD_MOVE.to_string(),
        arguments: Some(vec![serde_json::to_value(record).ok()?]),
    })
}

fn to_path(uri: &Url) -> anyhow::Result<PathBuf> {
    uri.to_file_path()
        .map_err(|_| anyhow::anyhow!("Not a file URI: {}", uri))
}

pub struct TsRefactorServer {
    client: Client,
    documents: DashMap<Url, Document>,
    workspace: RwLock<Option<Workspace>>,
    config: RwLock<RefactorConfig>,
    diagnostics_provider: RwLock<DiagnosticsProvider>,
    /// tsc diagnostics from the last save, per file
    tsc_diagnostics: DashMap<PathBuf, Vec<TscDiagnostic>>,
    registry: Registry,
    last_move: Mutex<Option<LastMove>>,
}

impl TsRefactorServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: DashMap::new(),
            workspace: RwLock::new(None),
            config: RwLock::new(RefactorConfig::default()),
            diagnostics_provider: RwLock::new(DiagnosticsProvider::default()),
            tsc_diagnostics: DashMap::new(),
            registry: Registry::builtin(),
            last_move: Mutex::new(None),
        }
    }

    /// A program snapshot for one request: the workspace index, or the open
    /// documents when no workspace root was given.
    fn snapshot(&self) -> (Program, RefactorConfig) {
        if let Ok(ws) = self.workspace.read() {
            if let Some(workspace) = ws.as_ref() {
                return (workspace.program(), workspace.config.clone());
            }
        }
        let program = Program::from_sources(
            self.documents
                .iter()
                .filter_map(|doc| Some((doc.uri.to_file_path().ok()?, doc.text.clone()))),
        );
        let config = self.config.read().map(|c| c.clone()).unwrap_or_default();
        (program, config)
    }

    fn last_move(&self) -> Option<LastMove> {
        self.last_move.lock().ok().and_then(|last| last.clone())
    }

    fn record_move(&self, record: MoveRecord) {
        let Ok(mut last) = self.last_move.lock() else {
            return;
        };
        match record {
            MoveRecord::Unchanged => {}
            MoveRecord::Recorded(moved) => *last = Some(moved),
            MoveRecord::Consumed => *last = None,
        }
    }

    fn on_change(&self, uri: Url, text: String, version: i32) {
        tracing::debug!("on_change: uri={}, text_len={}", uri, text.len());
        if let Ok(mut ws) = self.workspace.write() {
            if let Some(workspace) = ws.as_mut() {
                workspace.update_file(&uri, &text);
            }
        }
        self.documents.insert(uri.clone(), Document::new(uri, text, version));
    }

    /// Client diagnostics of the request plus the tsc diagnostics of the last save.
    fn predicate_diagnostics(&self, program: &Program, path: &Path, client: &[Diagnostic]) -> Vec<diagnostics::Diagnostic> {
        let Some(file) = program.file(path) else {
            return Vec::new();
        };
        let mut out: Vec<diagnostics::Diagnostic> = client
            .iter()
            .filter_map(|d| diagnostics::Diagnostic::from_lsp(d, file))
            .collect();
        if let Some(tsc) = self.tsc_diagnostics.get(path) {
            for d in tsc.iter().map(|d| d.to_diagnostic(file)) {
                if !out.contains(&d) {
                    out.push(d);
                }
            }
        }
        out
    }

    /// Runs one registered action and converts its edits. The move record is
    /// left for the caller to commit once the edit is applied.
    fn run_action(
        &self,
        uri: &Url,
        range: Range,
        name: &str,
        args: &ActionArgs,
        client_diagnostics: &[Diagnostic],
    ) -> anyhow::Result<(WorkspaceEdit, MoveRecord)> {
        let path = to_path(uri)?;
        let (program, config) = self.snapshot();
        let file = program
            .file(&path)
            .ok_or_else(|| anyhow::anyhow!("File not indexed: {}", path.display()))?;
        let offsets = file.position_to_offset(range.start)..file.position_to_offset(range.end);
        let diagnostics = self.predicate_diagnostics(&program, &path, client_diagnostics);
        let last_move = self.last_move();
        let ctx = ActionContext::new(&program, file, offsets, &diagnostics, &config, args)
            .with_last_move(last_move.as_ref());

        let result = self.registry.apply(name, &ctx)?;
        let edit = result.batch.into_workspace_edit(&program)?;
        Ok((edit, result.move_record))
    }

    async fn apply(&self, edit: WorkspaceEdit) -> bool {
        match self.client.apply_edit(edit).await {
            Ok(response) => {
                if !response.applied {
                    tracing::warn!("Client rejected edit: {:?}", response.failure_reason);
                }
                response.applied
            }
            Err(e) => {
                tracing::error!("workspace/applyEdit failed: {}", e);
                false
            }
        }
    }

    /// Runs an action and asks the client to apply it.
    async fn execute_action(&self, uri: Url, range: Range, name: &str, args: ActionArgs) -> serde_json::Value {
        tracing::info!("Executing {} at {}:{}", name, uri, range.start.line + 1);
        let planned = self.run_action(&uri, range, name, &args, &[]);
        match planned {
            Ok((edit, record)) => {
                let applied = self.apply(edit).await;
                if applied {
                    self.record_move(record);
                }
                serde_json::json!({
                    "success": true,
                    "action": name,
                    "applied": applied
                })
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", name, e);
                failure(e)
            }
        }
    }

    fn plan_file_move(&self, uri: &Url, destination: &str) -> anyhow::Result<(WorkspaceEdit, serde_json::Value, LastMove)> {
        let path = to_path(uri)?;
        let (program, result) = {
            let ws = self
                .workspace
                .read()
                .map_err(|_| anyhow::anyhow!("Could not acquire workspace lock"))?;
            let workspace = ws.as_ref().ok_or_else(|| anyhow::anyhow!("Workspace not initialized"))?;
            (workspace.program(), workspace.move_file(&path, destination)?)
        };
        let summary = serde_json::json!({
            "success": true,
            "oldPath": result.old_path,
            "newPath": result.new_path,
            "filesUpdated": result.files_updated
        });
        Ok((result.batch.into_workspace_edit(&program)?, summary, result.last_move))
    }

    fn plan_undo(&self, last: &LastMove) -> anyhow::Result<(WorkspaceEdit, serde_json::Value)> {
        let ws = self
            .workspace
            .read()
            .map_err(|_| anyhow::anyhow!("Could not acquire workspace lock"))?;
        let workspace = ws.as_ref().ok_or_else(|| anyhow::anyhow!("Workspace not initialized"))?;
        let program = workspace.program();
        let result = workspace.undo_move(last)?;
        let summary = serde_json::json!({
            "success": true,
            "oldPath": result.old_path,
            "newPath": result.new_path,
            "filesUpdated": result.files_updated
        });
        Ok((result.batch.into_workspace_edit(&program)?, summary))
    }

    fn run_tsc(&self, path: &Path) -> Vec<TscDiagnostic> {
        match self.diagnostics_provider.read() {
            Ok(provider) => provider.get_diagnostics(path),
            Err(_) => Vec::new(),
        }
    }

    fn lsp_diagnostics(&self, path: &Path, tsc: &[TscDiagnostic]) -> Vec<Diagnostic> {
        let (program, _) = self.snapshot();
        match program.file(path) {
            Some(file) => tsc.iter().map(|d| d.to_diagnostic(file).to_lsp(file)).collect(),
            None => Vec::new(),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for TsRefactorServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initialize: received request");

        let options = params.initialization_options.unwrap_or(serde_json::Value::Null);
        let config = RefactorConfig::from_json(&options).unwrap_or_else(|e| {
            tracing::warn!("Ignoring initializationOptions: {}", e);
            RefactorConfig::default()
        });

        if let Some(root_uri) = params.root_uri {
            if let Ok(path) = root_uri.to_file_path() {
                tracing::info!("Initializing workspace at {:?}", path);

                let mut workspace = Workspace::new(path.clone(), config.clone());
                if let Err(e) = workspace.initialize() {
                    tracing::error!("Failed to initialize workspace: {}", e);
                } else {
                    tracing::info!("Workspace initialized: {} files", workspace.file_count());

                    if let Ok(mut diag) = self.diagnostics_provider.write() {
                        *diag = DiagnosticsProvider::new(workspace.config.diagnostics.tsc_command.clone());
                        diag.set_workspace_root(&path);
                    }
                    if let Ok(mut ws) = self.workspace.write() {
                        *ws = Some(workspace);
                    }
                }
            }
        }
        if let Ok(mut current) = self.config.write() {
            *current = config;
        }

        let rename_filter = FileOperationRegistrationOptions {
            filters: vec![FileOperationFilter {
                scheme: Some("file".to_string()),
                pattern: FileOperationPattern {
                    glob: "**/*".to_string(),
                    matches: None,
                    options: None,
                },
            }],
        };

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                })),
                code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
                    code_action_kinds: Some(vec![CodeActionKind::QUICKFIX, CodeActionKind::REFACTOR]),
                    resolve_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        CMD_APPLY_ACTION.to_string(),
                        CMD_REORDER_PARAMETERS.to_string(),
                        CMD_MOVE_DECLARATION.to_string(),
                        CMD_MOVE_FILE.to_string(),
                        CMD_UNDO_LAST_MOVE.to_string(),
                        CMD_GET_DIAGNOSTICS.to_string(),
                        CMD_RECORD_MOVE.to_string(),
                    ],
                    ..Default::default()
                }),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: None,
                    file_operations: Some(WorkspaceFileOperationsServerCapabilities {
                        did_rename: Some(rename_filter),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "ts-refactor".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("initialized: received notification");

        let message = {
            if let Ok(ws) = self.workspace.read() {
                if let Some(workspace) = ws.as_ref() {
                    format!("TS refactor initialized: {} files indexed", workspace.file_count())
                } else {
                    "TS refactor initialized (no workspace)".to_string()
                }
            } else {
                "TS refactor initialized".to_string()
            }
        };

        self.client.log_message(MessageType::INFO, message).await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        tracing::info!("did_open: uri={}", params.text_document.uri);
        let doc = params.text_document;
        self.on_change(doc.uri, doc.text, doc.version);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_change(uri, change.text, version);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let enabled = self
            .workspace
            .read()
            .ok()
            .and_then(|ws| ws.as_ref().map(|w| w.config.diagnostics.enabled))
            .unwrap_or(false);
        if !enabled {
            return;
        }
        let Ok(path) = uri.to_file_path() else {
            return;
        };

        let tsc = self.run_tsc(&path);
        tracing::info!("tsc reported {} diagnostics for {}", tsc.len(), path.display());
        let lsp = self.lsp_diagnostics(&path, &tsc);
        self.tsc_diagnostics.insert(path, tsc);
        self.client.publish_diagnostics(uri, lsp, None).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        // The buffer may have been discarded; go back to what is on disk.
        if let (Ok(path), Ok(mut ws)) = (uri.to_file_path(), self.workspace.write()) {
            if let Some(workspace) = ws.as_mut() {
                if path.exists() {
                    if let Err(e) = workspace.index_file(&path) {
                        tracing::warn!("Failed to re-index {:?}: {}", path, e);
                    }
                } else {
                    workspace.remove_file(&uri);
                }
            }
        }
    }

    async fn did_rename_files(&self, params: RenameFilesParams) {
        for rename in params.files {
            let (Ok(old_uri), Ok(new_uri)) = (Url::parse(&rename.old_uri), Url::parse(&rename.new_uri)) else {
                continue;
            };
            let (Ok(old_path), Ok(new_path)) = (old_uri.to_file_path(), new_uri.to_file_path()) else {
                continue;
            };
            tracing::info!("File renamed: {} -> {}", old_path.display(), new_path.display());
            self.tsc_diagnostics.remove(&old_path);
            if let Ok(mut ws) = self.workspace.write() {
                if let Some(workspace) = ws.as_mut() {
                    if let Err(e) = workspace.notify_file_renamed(&old_path, &new_path) {
                        tracing::warn!("Failed to re-index renamed file: {}", e);
                    }
                }
            }
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return Ok(None);
        };
        let (program, config) = self.snapshot();
        let Some(file) = program.file(&path) else {
            return Ok(None);
        };

        let offsets = file.position_to_offset(params.range.start)..file.position_to_offset(params.range.end);
        let diagnostics = self.predicate_diagnostics(&program, &path, &params.context.diagnostics);
        let last_move = self.last_move();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, offsets, &diagnostics, &config, &args)
            .with_last_move(last_move.as_ref());

        let actions: Vec<CodeActionOrCommand> = self
            .registry
            .applicable(&ctx)
            .into_iter()
            .map(|action| {
                let data = ActionData {
                    uri: uri.clone(),
                    range: params.range,
                    name: action.name,
                    args: ActionArgs::default(),
                };
                CodeActionOrCommand::CodeAction(CodeAction {
                    title: action.description,
                    kind: Some(match action.kind {
                        ActionKind::QuickFix => CodeActionKind::QUICKFIX,
                        ActionKind::Refactor => CodeActionKind::REFACTOR,
                    }),
                    data: serde_json::to_value(data).ok(),
                    ..Default::default()
                })
            })
            .collect();

        tracing::debug!("code_action: {} actions at {}:{}", actions.len(), uri, params.range.start.line + 1);
        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn code_action_resolve(&self, mut action: CodeAction) -> Result<CodeAction> {
        let Some(data) = action.data.clone() else {
            return Ok(action);
        };
        let data: ActionData = serde_json::from_value(data).map_err(|e| invalid_params(e.to_string()))?;
        let diagnostics = action.diagnostics.clone().unwrap_or_default();

        match self.run_action(&data.uri, data.range, &data.name, &data.args, &diagnostics) {
            Ok((edit, record)) => {
                action.edit = Some(edit);
                action.command = record_move_command(&record);
            }
            Err(e) => tracing::warn!("Could not resolve {}: {}", data.name, e),
        }
        Ok(action)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<serde_json::Value>> {
        tracing::info!("execute_command: {:?}", params.command);
        let arguments = params.arguments;

        match params.command.as_str() {
            CMD_APPLY_ACTION => {
                // [uri, range, actionName, args?]
                let uri: Url = arg(&arguments, 0, "uri")?;
                let range: Range = arg(&arguments, 1, "range")?;
                let name: String = arg(&arguments, 2, "actionName")?;
                let args: ActionArgs = if arguments.len() > 3 {
                    arg(&arguments, 3, "args")?
                } else {
                    ActionArgs::default()
                };
                Ok(Some(self.execute_action(uri, range, &name, args).await))
            }
            CMD_REORDER_PARAMETERS => {
                // [uri, line, character, permutation]
                let uri: Url = arg(&arguments, 0, "uri")?;
                let line: u32 = arg(&arguments, 1, "line")?;
                let character: u32 = arg(&arguments, 2, "character")?;
                let permutation: Vec<usize> = arg(&arguments, 3, "permutation")?;
                let position = Position { line, character };
                let args = ActionArgs {
                    permutation: Some(permutation),
                    destination: None,
                };
                Ok(Some(
                    self.execute_action(uri, Range::new(position, position), "reorderParams", args)
                        .await,
                ))
            }
            CMD_MOVE_DECLARATION => {
                // [uri, line, character, destinationPath]
                let uri: Url = arg(&arguments, 0, "uri")?;
                let line: u32 = arg(&arguments, 1, "line")?;
                let character: u32 = arg(&arguments, 2, "character")?;
                let destination: String = arg(&arguments, 3, "destinationPath")?;
                let position = Position { line, character };
                let args = ActionArgs {
                    permutation: None,
                    destination: Some(destination),
                };
                Ok(Some(
                    self.execute_action(uri, Range::new(position, position), "moveDeclaration", args)
                        .await,
                ))
            }
            CMD_MOVE_FILE => {
                // [uri, destinationPath], destination relative to the file's folder
                let uri: Url = arg(&arguments, 0, "uri")?;
                let destination: String = arg(&arguments, 1, "destinationPath")?;
                tracing::info!("Moving file {} to {}", uri, destination);

                let planned = self.plan_file_move(&uri, &destination);
                match planned {
                    Ok((edit, summary, last)) => {
                        if self.apply(edit).await {
                            self.record_move(MoveRecord::Recorded(last));
                        }
                        Ok(Some(summary))
                    }
                    Err(e) => Ok(Some(failure(e))),
                }
            }
            CMD_UNDO_LAST_MOVE => {
                let Some(last) = self.last_move() else {
                    return Ok(Some(failure("Nothing to undo")));
                };
                tracing::info!("Undoing move {} -> {}", last.source.display(), last.dest.display());

                let planned = self.plan_undo(&last);
                match planned {
                    Ok((edit, summary)) => {
                        if self.apply(edit).await {
                            self.record_move(MoveRecord::Consumed);
                        }
                        Ok(Some(summary))
                    }
                    Err(e) => Ok(Some(failure(e))),
                }
            }
            CMD_RECORD_MOVE => {
                // [moveRecord]
                let record: MoveRecord = arg(&arguments, 0, "moveRecord")?;
                tracing::info!("Recording applied move: {:?}", record);
                self.record_move(record);
                Ok(Some(serde_json::json!({ "success": true })))
            }
            CMD_GET_DIAGNOSTICS => {
                // [uri]
                let uri: Url = arg(&arguments, 0, "uri")?;
                let path = uri
                    .to_file_path()
                    .map_err(|_| invalid_params(format!("Not a file URI: {}", uri)))?;
                tracing::info!("Getting diagnostics for {}", uri);

                let tsc = self.run_tsc(&path);
                let diagnostics = self.lsp_diagnostics(&path, &tsc);
                self.tsc_diagnostics.insert(path, tsc);

                let diagnostics_json: Vec<serde_json::Value> = diagnostics
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "range": {
                                "start": { "line": d.range.start.line, "character": d.range.start.character },
                                "end": { "line": d.range.end.line, "character": d.range.end.character }
                            },
                            "code": d.code,
                            "message": d.message,
                            "source": d.source
                        })
                    })
                    .collect();

                Ok(Some(serde_json::json!({
                    "uri": uri,
                    "diagnostics": diagnostics_json
                })))
            }
            _ => {
                tracing::warn!("Unknown command: {}", params.command);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MoveKind;

    #[test]
    fn test_arg_decoding() {
        let arguments = vec![serde_json::json!("file:///p/a.ts"), serde_json::json!([1, 0])];
        let uri: Url = arg(&arguments, 0, "uri").unwrap();
        assert_eq!(uri.path(), "/p/a.ts");
        let permutation: Vec<usize> = arg(&arguments, 1, "permutation").unwrap();
        assert_eq!(permutation, vec![1, 0]);
        assert!(arg::<u32>(&arguments, 0, "line").is_err());
        assert!(arg::<u32>(&arguments, 5, "line").is_err());
    }

    #[test]
    fn test_action_data_args_default() {
        let data: ActionData = serde_json::from_value(serde_json::json!({
            "uri": "file:///p/a.ts",
            "range": { "start": { "line": 0, "character": 1 }, "end": { "line": 0, "character": 1 } },
            "name": "addType"
        }))
        .unwrap();
        assert_eq!(data.name, "addType");
        assert_eq!(data.args, ActionArgs::default());
    }

    #[test]
    fn test_move_record_command_round_trips() {
        assert!(record_move_command(&MoveRecord::Unchanged).is_none());

        let record = MoveRecord::Recorded(LastMove {
            kind: MoveKind::File,
            source: PathBuf::from("/p/a.ts"),
            dest: PathBuf::from("/p/lib/a.ts"),
        });
        let command = record_move_command(&record).unwrap();
        assert_eq!(command.command, CMD_RECORD_MOVE);
        let arguments = command.arguments.unwrap();
        let decoded: MoveRecord = arg(&arguments, 0, "moveRecord").unwrap();
        assert_eq!(decoded, record);

        let consumed = record_move_command(&MoveRecord::Consumed).unwrap();
        let decoded: MoveRecord = arg(&consumed.arguments.unwrap(), 0, "moveRecord").unwrap();
        assert_eq!(decoded, MoveRecord::Consumed);
    }
}
