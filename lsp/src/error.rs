//! Error taxonomy for the client protocol layer.
//!
//! Every failure mode a tool can observe is a distinct variant; nothing is
//! swallowed into a generic empty result. Local recovery is limited to
//! stream resynchronization (`FrameError::Malformed`) and stale-document
//! clearing; everything else propagates.

use std::path::PathBuf;
use std::time::Duration;

/// Errors surfaced by [`crate::LspClient`] and its components.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server executable could not be launched. Fatal for the instance,
    /// never retried.
    #[error("failed to launch '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// The server sent a frame whose body is not valid JSON. Recoverable
    /// per frame; repeated occurrences escalate to [`Self::ProtocolDesync`].
    #[error("malformed frame from server: {0}")]
    ProtocolDecode(String),

    /// An outgoing message failed to serialize.
    #[error("serializing outgoing message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Too many consecutive decode failures; the stream is presumed
    /// desynchronized and the client is terminated.
    #[error("protocol desync after {failures} consecutive decode failures")]
    ProtocolDesync { failures: u32 },

    /// The server returned a JSON-RPC error object. Propagated with the
    /// server's code and message intact; semantic, not transient.
    #[error("server error {code} for '{method}': {message}")]
    Lsp {
        method: &'static str,
        code: i64,
        message: String,
    },

    /// No response within the configured window. The pending slot is
    /// rejected and the id abandoned; the process is not killed for one
    /// timeout.
    #[error("request '{method}' timed out after {timeout:?}")]
    RequestTimeout {
        method: &'static str,
        timeout: Duration,
    },

    /// The language-server subprocess died. All pending requests reject
    /// with this; subsequent calls fail fast.
    #[error("language server process exited")]
    ProcessExited,

    /// The shutdown grace period elapsed and the process was killed.
    #[error("language server did not exit within {grace:?}; killed")]
    ShutdownTimeout { grace: Duration },

    /// Neither the push nor the poll path produced a confident result in
    /// time. Distinct from a genuine empty-diagnostics result.
    #[error("no confident diagnostics for {} within {timeout:?}", path.display())]
    DiagnosticsTimeout { path: PathBuf, timeout: Duration },

    /// The client has been shut down or its process died; calls fail fast
    /// instead of hanging.
    #[error("client not initialized")]
    NotInitialized,

    /// The path cannot be represented as a file URI.
    #[error("cannot convert path to file URI: {}", .0.display())]
    InvalidPath(PathBuf),

    /// The target file could not be read when opening from disk.
    #[error("cannot read {}: {reason}", path.display())]
    FileRead { path: PathBuf, reason: String },

    /// The initialize handshake failed. Fatal for the instance.
    #[error("initialize handshake failed: {0}")]
    Handshake(String),

    /// The response body did not match the expected result shape.
    #[error("unexpected result shape for '{method}': {detail}")]
    ResultShape {
        method: &'static str,
        detail: String,
    },
}
