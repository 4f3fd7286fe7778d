//! The client facade — owns one language-server subprocess and exposes its
//! capabilities as request/response calls.
//!
//! One writer task serializes every frame onto the server's stdin; one
//! reader task demultiplexes stdout into responses (routed to the
//! correlator), server-initiated requests (answered with method-not-found),
//! and notifications (diagnostics routed to the reconciler, the rest
//! dropped). All facade methods take `&self` and may run concurrently;
//! completion order is the server's, not send order.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};

use sextant_types::{
    CodeActionInfo, CompletionEntry, DiagnosticSet, DiagnosticsConfig, ENV_SECRET_DENYLIST,
    FileEdit, HoverInfo, Location, LspConfig, Position, Range, ServerConfig, SymbolNode, TextEdit,
    TimeoutConfig,
};

use crate::codec::{FrameReader, FrameWriter};
use crate::correlate::Correlator;
use crate::diagnostics::{self, SharedDiagnostics};
use crate::documents::{DocumentStore, SyncAction};
use crate::error::ClientError;
use crate::protocol::{self, Notification, PublishDiagnosticsParams, Request};

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Consecutive malformed frames tolerated before the stream is declared
/// desynchronized and the client terminated.
const DECODE_FAILURE_LIMIT: u32 = 5;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

/// Why the reader task stopped. Distinguishes a dead process from a stream
/// we gave up on, so in-flight requests reject with the right error.
#[derive(Debug, Clone, Copy)]
enum DeathCause {
    Exited,
    Desync { failures: u32 },
}

enum IncomingFrame {
    Response {
        id: u64,
        body: Value,
    },
    ServerRequest {
        id: Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

/// Minimal glob matcher for env var denylist patterns.
/// Handles `*_SUFFIX`, `PREFIX_*`, `*_INFIX*`, and exact match.
/// Both pattern and key are compared in uppercase.
fn env_glob_matches(pattern: &str, key_upper: &str) -> bool {
    let pat = pattern.to_uppercase();
    match (pat.starts_with('*'), pat.ends_with('*')) {
        (true, true) => {
            let inner = &pat[1..pat.len() - 1];
            key_upper.contains(inner)
        }
        (true, false) => {
            let suffix = &pat[1..];
            key_upper.ends_with(suffix)
        }
        (false, true) => {
            let prefix = &pat[..pat.len() - 1];
            key_upper.starts_with(prefix)
        }
        (false, false) => key_upper == pat,
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for c in path.components() {
        match c {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

fn parse_incoming(frame: &Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => Some(IncomingFrame::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(IncomingFrame::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// A client connected to one running language server.
///
/// Construction is initialization: [`LspClient::start`] spawns the process
/// and completes the `initialize`/`initialized` handshake before returning.
/// After the process dies every call fails fast with
/// [`ClientError::NotInitialized`] instead of hanging.
pub struct LspClient {
    server_name: String,
    language_id: String,
    workspace_root: PathBuf,
    timeouts: TimeoutConfig,
    diagnostics_config: DiagnosticsConfig,
    initialization_options: Option<Value>,
    settings: Option<Value>,

    child: Mutex<Option<Child>>,
    exit_status: std::sync::Mutex<Option<std::process::ExitStatus>>,
    server_capabilities: std::sync::Mutex<Option<Value>>,

    writer_tx: mpsc::Sender<WriterCommand>,
    correlator: Arc<Correlator>,
    documents: Mutex<DocumentStore>,
    diagnostics: Arc<SharedDiagnostics>,
    alive: Arc<AtomicBool>,
    death: Arc<std::sync::OnceLock<DeathCause>>,
}

impl LspClient {
    /// Spawn the configured server and perform the LSP handshake.
    ///
    /// Fails with [`ClientError::Spawn`] when the executable cannot be
    /// launched and [`ClientError::Handshake`] when the server rejects
    /// initialization; both are fatal for this instance.
    pub async fn start(
        name: &str,
        server: &ServerConfig,
        config: &LspConfig,
        workspace_root: &Path,
    ) -> Result<Arc<Self>, ClientError> {
        let resolved_cmd = which::which(&server.command).map_err(|e| ClientError::Spawn {
            command: server.command.clone(),
            reason: e.to_string(),
        })?;

        let mut cmd = Command::new(&resolved_cmd);
        cmd.args(&server.args)
            .current_dir(workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Strip secret-bearing env vars; the language server has no business
        // seeing the host's credentials.
        for (key, _) in std::env::vars() {
            let upper = key.to_uppercase();
            if ENV_SECRET_DENYLIST
                .iter()
                .any(|pat| env_glob_matches(pat, &upper))
            {
                cmd.env_remove(&key);
            }
        }

        let mut child = cmd.spawn().map_err(|e| ClientError::Spawn {
            command: server.command.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ClientError::Spawn {
            command: server.command.clone(),
            reason: "no stdout pipe".to_string(),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| ClientError::Spawn {
            command: server.command.clone(),
            reason: "no stdin pipe".to_string(),
        })?;

        // stderr is log output only, never protocol.
        if let Some(stderr) = child.stderr.take() {
            let stderr_name = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %stderr_name, "stderr: {line}");
                }
            });
        }

        let client = Self::from_streams(stdin, stdout, Some(child), name, server, config, workspace_root);
        client.initialize().await?;
        Ok(client)
    }

    /// Wire a client onto arbitrary byte streams.
    ///
    /// `start` uses the child's pipes; tests use `tokio::io::duplex` with a
    /// scripted peer. Spawns the writer and reader tasks.
    pub(crate) fn from_streams<W, R>(
        stdin: W,
        stdout: R,
        child: Option<Child>,
        name: &str,
        server: &ServerConfig,
        config: &LspConfig,
        workspace_root: &Path,
    ) -> Arc<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("LSP write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let correlator = Arc::new(Correlator::new());
        let diagnostics = Arc::new(SharedDiagnostics::new());
        let alive = Arc::new(AtomicBool::new(true));
        let death = Arc::new(std::sync::OnceLock::new());

        let reader_correlator = Arc::clone(&correlator);
        let reader_diagnostics = Arc::clone(&diagnostics);
        let reader_alive = Arc::clone(&alive);
        let reader_death = Arc::clone(&death);
        let reader_writer_tx = writer_tx.clone();
        let reader_name = name.to_string();
        let reader_workspace_root = normalize_path(workspace_root);
        tokio::spawn(async move {
            let mut reader = FrameReader::new(stdout);
            let mut decode_failures: u32 = 0;
            let cause = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        decode_failures = 0;
                        Self::dispatch_frame(
                            &frame,
                            &reader_correlator,
                            &reader_diagnostics,
                            &reader_writer_tx,
                            &reader_name,
                            &reader_workspace_root,
                        )
                        .await;
                    }
                    Ok(None) => {
                        tracing::info!(server = %reader_name, "language server closed stdout");
                        break DeathCause::Exited;
                    }
                    Err(e) if e.is_recoverable() => {
                        decode_failures += 1;
                        let decode = ClientError::ProtocolDecode(e.to_string());
                        tracing::warn!(
                            server = %reader_name,
                            failures = decode_failures,
                            "{decode}"
                        );
                        if decode_failures >= DECODE_FAILURE_LIMIT {
                            break DeathCause::Desync {
                                failures: decode_failures,
                            };
                        }
                    }
                    Err(e) => {
                        tracing::warn!(server = %reader_name, "LSP reader error: {e}");
                        break DeathCause::Exited;
                    }
                }
            };
            // Whatever ended the loop, the process is unusable: reject every
            // waiter now rather than letting them hang.
            let _ = reader_death.set(cause);
            reader_alive.store(false, Ordering::Release);
            reader_correlator.fail_all().await;
            reader_diagnostics.mark_dead();
        });

        Arc::new(Self {
            server_name: name.to_string(),
            language_id: server.language_id.clone(),
            workspace_root: workspace_root.to_path_buf(),
            timeouts: config.timeouts.clone(),
            diagnostics_config: config.diagnostics.clone(),
            initialization_options: server.initialization_options.clone(),
            settings: server.settings.clone(),
            child: Mutex::new(child),
            exit_status: std::sync::Mutex::new(None),
            server_capabilities: std::sync::Mutex::new(None),
            writer_tx,
            correlator,
            documents: Mutex::new(DocumentStore::new()),
            diagnostics,
            alive,
            death,
        })
    }

    /// The error that describes why the connection died.
    fn death_error(&self) -> ClientError {
        match self.death.get() {
            Some(DeathCause::Desync { failures }) => ClientError::ProtocolDesync {
                failures: *failures,
            },
            _ => ClientError::ProcessExited,
        }
    }

    async fn dispatch_frame(
        frame: &Value,
        correlator: &Correlator,
        diagnostics: &SharedDiagnostics,
        writer_tx: &mpsc::Sender<WriterCommand>,
        server_name: &str,
        workspace_root: &Path,
    ) {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame from '{server_name}'");
            return;
        };

        match incoming {
            IncomingFrame::Response { id, body } => {
                if !correlator.resolve(id, body).await {
                    tracing::trace!(
                        server = %server_name,
                        id,
                        "dropping response with no pending request"
                    );
                }
            }
            IncomingFrame::ServerRequest { id, method } => {
                // Many servers send client/registerCapability, workspace/configuration, etc.
                // We must respond or the server may block.
                tracing::debug!(
                    "LSP '{server_name}' sent request: {method} — replying method not found"
                );
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(response)).await;
            }
            IncomingFrame::Notification { method, params } => {
                Self::handle_notification(server_name, &method, params, diagnostics, workspace_root);
            }
        }
    }

    fn handle_notification(
        server_name: &str,
        method: &str,
        params: Option<Value>,
        diagnostics: &SharedDiagnostics,
        workspace_root: &Path,
    ) {
        match method {
            "textDocument/publishDiagnostics" => {
                let Some(params) = params else { return };
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(diag_params) => {
                        let Some(path) = protocol::file_uri_to_path(&diag_params.uri) else {
                            tracing::debug!(
                                "LSP '{server_name}' published diagnostics for non-file uri: {}",
                                diag_params.uri
                            );
                            return;
                        };
                        let normalized = normalize_path(&path);
                        if !normalized.starts_with(workspace_root) {
                            tracing::warn!(
                                "LSP '{server_name}' reported diagnostics for path outside \
                                 workspace: {}",
                                path.display()
                            );
                            return;
                        }
                        let items = diag_params
                            .diagnostics
                            .iter()
                            .map(protocol::WireDiagnostic::to_diagnostic)
                            .collect();
                        // Key by the uri we would generate for this path, so
                        // waiters and pushes agree regardless of how the
                        // server spells the uri.
                        match protocol::path_to_file_uri(&path) {
                            Ok(canonical) => {
                                diagnostics.record_push(canonical.as_str(), path, items);
                            }
                            Err(e) => tracing::debug!("skipping diagnostics: {e}"),
                        }
                    }
                    Err(e) => {
                        tracing::debug!(
                            "Failed to parse publishDiagnostics from '{server_name}': {e}"
                        );
                    }
                }
            }
            _ => {
                tracing::trace!("Ignoring notification from '{server_name}': {method}");
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    async fn initialize(&self) -> Result<(), ClientError> {
        let root_uri = protocol::path_to_file_uri(&self.workspace_root)?;
        let params =
            protocol::initialize_params(root_uri.as_str(), self.initialization_options.as_ref());

        let result = self
            .send_request("initialize", Some(params), self.timeouts.initialize())
            .await
            .map_err(|e| match e {
                ClientError::Lsp { message, .. } => ClientError::Handshake(message),
                other => other,
            })?;

        *self
            .server_capabilities
            .lock()
            .expect("capabilities lock") = result.get("capabilities").cloned();

        self.send_notification("initialized", Some(json!({})))
            .await?;

        // Post-initialize step: push workspace settings when configured.
        if let Some(settings) = &self.settings {
            self.send_notification(
                "workspace/didChangeConfiguration",
                Some(protocol::did_change_configuration_params(settings)),
            )
            .await?;
        }

        tracing::info!(server = %self.server_name, "LSP client initialized");
        Ok(())
    }

    /// Gracefully stop the server: `shutdown` request, `exit` notification,
    /// bounded wait, then kill.
    ///
    /// Returns [`ClientError::ShutdownTimeout`] when the process had to be
    /// killed after the grace period.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let grace = self.timeouts.shutdown_grace();

        if self.is_alive() {
            if let Ok(response) = self.send_request("shutdown", None, grace).await
                && response.get("error").is_none()
            {
                let _ = self.send_notification("exit", None).await;
            }
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;
        self.alive.store(false, Ordering::Release);
        self.correlator.fail_all().await;
        self.diagnostics.mark_dead();

        let mut child_slot = self.child.lock().await;
        let Some(child) = child_slot.as_mut() else {
            return Ok(());
        };

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                *self.exit_status.lock().expect("exit status lock") = Some(status);
                *child_slot = None;
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %self.server_name, "waiting for server exit: {e}");
                *child_slot = None;
                Ok(())
            }
            Err(_) => {
                tracing::debug!(server = %self.server_name, "didn't exit in time, killing");
                let _ = child.kill().await;
                *child_slot = None;
                Err(ClientError::ShutdownTimeout { grace })
            }
        }
    }

    /// Whether the server process is still believed to be running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// The exit status, once the process has been reaped.
    #[must_use]
    pub fn exit_status(&self) -> Option<std::process::ExitStatus> {
        *self.exit_status.lock().expect("exit status lock")
    }

    /// Raw server capabilities from the initialize response.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<Value> {
        self.server_capabilities
            .lock()
            .expect("capabilities lock")
            .clone()
    }

    // ── Plumbing ─────────────────────────────────────────────────────────

    async fn send_request(
        &self,
        method: &'static str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        if !self.is_alive() {
            return Err(ClientError::NotInitialized);
        }

        let (id, rx) = self.correlator.register().await;
        let request = Request::new(id, method, params);
        let frame = match serde_json::to_value(&request) {
            Ok(frame) => frame,
            Err(e) => {
                self.correlator.abandon(id).await;
                return Err(ClientError::Encode(e));
            }
        };

        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            // Writer gone means the process is gone; don't leak the slot.
            self.correlator.abandon(id).await;
            return Err(ClientError::ProcessExited);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => {
                if let Some(error) = body.get("error") {
                    return Err(ClientError::Lsp {
                        method,
                        code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                        message: error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string(),
                    });
                }
                Ok(body.get("result").cloned().unwrap_or(Value::Null))
            }
            Ok(Err(_)) => {
                // Sender dropped: the reader task failed everything on exit.
                self.correlator.abandon(id).await;
                Err(self.death_error())
            }
            Err(_) => {
                // Abandon the id so the eventual late response is a lookup
                // miss, not a delivery to a stranger.
                self.correlator.abandon(id).await;
                Err(ClientError::RequestTimeout { method, timeout })
            }
        }
    }

    async fn send_notification(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<(), ClientError> {
        if !self.is_alive() {
            return Err(ClientError::NotInitialized);
        }
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification).map_err(ClientError::Encode)?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| ClientError::ProcessExited)
    }

    // ── Document synchronization ─────────────────────────────────────────

    fn uri_for(&self, path: &Path) -> Result<String, ClientError> {
        Ok(protocol::path_to_file_uri(path)?.to_string())
    }

    async fn apply_sync_action(
        &self,
        uri: &str,
        content: &str,
        action: SyncAction,
    ) -> Result<(), ClientError> {
        match action {
            SyncAction::Open { version } => {
                self.diagnostics.reset(uri);
                self.send_notification(
                    "textDocument/didOpen",
                    Some(protocol::did_open_params(
                        uri,
                        &self.language_id,
                        version,
                        content,
                    )),
                )
                .await
            }
            SyncAction::Change { version } => {
                self.diagnostics.reset(uri);
                self.send_notification(
                    "textDocument/didChange",
                    Some(protocol::did_change_params(uri, version, content)),
                )
                .await
            }
            SyncAction::Close => {
                // Clear first so a reopen can never observe the stale set.
                self.diagnostics.clear(uri);
                self.send_notification(
                    "textDocument/didClose",
                    Some(protocol::did_close_params(uri)),
                )
                .await
            }
            SyncAction::None => Ok(()),
        }
    }

    /// Open `path` with the given content (virtual or on-disk).
    ///
    /// Idempotent for identical content; different content becomes a
    /// versioned change.
    pub async fn open_document(&self, path: &Path, content: &str) -> Result<(), ClientError> {
        let uri = self.uri_for(path)?;
        let mut docs = self.documents.lock().await;
        let action = docs.open(&uri, content);
        self.apply_sync_action(&uri, content, action).await
    }

    /// Replace the document's content, bumping the version.
    pub async fn update_document(
        &self,
        path: &Path,
        content: &str,
        forced_version: Option<i32>,
    ) -> Result<(), ClientError> {
        let uri = self.uri_for(path)?;
        let mut docs = self.documents.lock().await;
        let action = docs.update(&uri, content, forced_version);
        self.apply_sync_action(&uri, content, action).await
    }

    /// Close the document and drop its cached diagnostics.
    pub async fn close_document(&self, path: &Path) -> Result<(), ClientError> {
        let uri = self.uri_for(path)?;
        let mut docs = self.documents.lock().await;
        let action = docs.close(&uri);
        self.apply_sync_action(&uri, "", action).await
    }

    /// Make sure the server has the document open, reading it from disk if
    /// no tool opened it explicitly.
    async fn ensure_open(&self, path: &Path) -> Result<String, ClientError> {
        let uri = self.uri_for(path)?;
        let mut docs = self.documents.lock().await;
        if docs.is_open(&uri) {
            return Ok(uri);
        }
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClientError::FileRead {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        let action = docs.open(&uri, &content);
        self.apply_sync_action(&uri, &content, action).await?;
        Ok(uri)
    }

    // ── Capabilities ─────────────────────────────────────────────────────

    /// Hover information at a 1-based position.
    pub async fn hover(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<HoverInfo>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/hover",
                Some(protocol::text_document_position_params(&uri, position)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_hover(&result)
    }

    /// Definition site(s) of the symbol at a position.
    pub async fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Vec<Location>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/definition",
                Some(protocol::text_document_position_params(&uri, position)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_locations("textDocument/definition", &result)
    }

    /// All references to the symbol at a position.
    pub async fn references(
        &self,
        path: &Path,
        position: Position,
        include_declaration: bool,
    ) -> Result<Vec<Location>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/references",
                Some(protocol::references_params(
                    &uri,
                    position,
                    include_declaration,
                )),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_locations("textDocument/references", &result)
    }

    /// Workspace-wide rename of the symbol at a position.
    pub async fn rename(
        &self,
        path: &Path,
        position: Position,
        new_name: &str,
    ) -> Result<Vec<FileEdit>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/rename",
                Some(protocol::rename_params(&uri, position, new_name)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_workspace_edit(&result)
    }

    /// The document's symbol outline.
    pub async fn document_symbols(&self, path: &Path) -> Result<Vec<SymbolNode>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/documentSymbol",
                Some(protocol::document_symbol_params(&uri)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_document_symbols(&result)
    }

    /// Completion candidates at a position.
    pub async fn completion(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Vec<CompletionEntry>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/completion",
                Some(protocol::completion_params(&uri, position)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_completions(&result)
    }

    /// Code actions available for a range.
    pub async fn code_actions(
        &self,
        path: &Path,
        range: Range,
    ) -> Result<Vec<CodeActionInfo>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/codeAction",
                Some(protocol::code_action_params(&uri, range)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_code_actions(&result)
    }

    /// Whole-document formatting edits.
    pub async fn formatting(
        &self,
        path: &Path,
        tab_size: u32,
        insert_spaces: bool,
    ) -> Result<Vec<TextEdit>, ClientError> {
        let uri = self.ensure_open(path).await?;
        let result = self
            .send_request(
                "textDocument/formatting",
                Some(protocol::formatting_params(&uri, tab_size, insert_spaces)),
                self.timeouts.request(),
            )
            .await?;
        protocol::parse_text_edits("textDocument/formatting", &result)
    }

    /// Wait for a confident diagnostic result for an open document.
    pub async fn wait_for_diagnostics(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<DiagnosticSet, ClientError> {
        if !self.is_alive() {
            return Err(ClientError::NotInitialized);
        }
        let uri = self.ensure_open(path).await?;
        let document_bytes = self.documents.lock().await.content_len(&uri);
        diagnostics::wait_for(
            &self.diagnostics,
            &uri,
            path,
            document_bytes,
            &self.diagnostics_config,
            timeout,
        )
        .await
    }

    /// One-shot diagnostic check of content that need not match the disk.
    ///
    /// Close-then-reopen rather than update-in-place: some servers cache
    /// analysis keyed on the open/close transition, and the final close
    /// keeps this check's content from biasing the next open of the same
    /// path.
    pub async fn check_content(
        &self,
        path: &Path,
        content: &str,
        timeout: Duration,
    ) -> Result<DiagnosticSet, ClientError> {
        self.close_document(path).await?;
        self.open_document(path, content).await?;
        let result = self.wait_for_diagnostics(path, timeout).await;
        self.close_document(path).await?;
        result
    }
}
