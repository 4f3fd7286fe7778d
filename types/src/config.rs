//! Configuration consumed by the LSP client at initialize time.
//!
//! The host deserializes these from its own config file and hands them over
//! opaquely. All diagnostics-timing knobs live here rather than as constants:
//! the right values are environment-dependent, not a contract.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

/// Configuration for the LSP client subsystem.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LspConfig {
    /// Per-language server configurations, keyed by name (e.g. "rust").
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Configuration for a single language server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Executable command (e.g. "rust-analyzer").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// LSP language identifier (e.g. "rust", "typescript").
    pub language_id: String,
    /// Path globs this server handles (e.g. `["**/*.rs"]`).
    #[serde(default)]
    pub file_globs: Vec<String>,
    /// Files that indicate a workspace root (e.g. `["Cargo.toml"]`).
    #[serde(default)]
    pub root_markers: Vec<String>,
    /// Opaque `initializationOptions` forwarded in the initialize request.
    #[serde(default)]
    pub initialization_options: Option<serde_json::Value>,
    /// Opaque settings pushed via `workspace/didChangeConfiguration` after
    /// the handshake completes.
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

/// Request and lifecycle timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for the initialize handshake. Generous: servers index the
    /// workspace on cold start.
    #[serde(default = "default_initialize_secs")]
    pub initialize_secs: u64,
    /// Timeout for ordinary requests.
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    /// Grace period for the shutdown/exit sequence before the process is
    /// forcibly killed.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_initialize_secs() -> u64 {
    60
}

fn default_request_secs() -> u64 {
    30
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            initialize_secs: default_initialize_secs(),
            request_secs: default_request_secs(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn initialize(&self) -> Duration {
        Duration::from_secs(self.initialize_secs)
    }

    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Tunables for the push/poll diagnostics reconciliation.
///
/// The minimum-poll-count heuristic is approximate by nature: an empty
/// result early on can mean "not analyzed yet" rather than "no errors",
/// so emptiness is only trusted after `min_poll_count` checks.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// How long to wait for a pushed `publishDiagnostics` before polling.
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    /// Interval between poll checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of poll checks before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// Poll checks required before an empty result is trusted.
    #[serde(default = "default_min_poll_count")]
    pub min_poll_count: u32,
    /// Documents at or above this size get a scaled-up event window, since
    /// slower servers take longer to analyze bigger files.
    #[serde(default = "default_large_file_bytes")]
    pub large_file_bytes: usize,
    /// Multiplier applied to `event_timeout_ms` for large documents.
    #[serde(default = "default_large_file_multiplier")]
    pub large_file_multiplier: u32,
}

fn default_event_timeout_ms() -> u64 {
    1500
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_max_polls() -> u32 {
    10
}

fn default_min_poll_count() -> u32 {
    3
}

fn default_large_file_bytes() -> usize {
    128 * 1024
}

fn default_large_file_multiplier() -> u32 {
    3
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            event_timeout_ms: default_event_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            min_poll_count: default_min_poll_count(),
            large_file_bytes: default_large_file_bytes(),
            large_file_multiplier: default_large_file_multiplier(),
        }
    }
}

impl DiagnosticsConfig {
    /// Event window before the poll fallback starts, scaled for document size.
    #[must_use]
    pub fn event_window(&self, document_bytes: usize) -> Duration {
        let base = Duration::from_millis(self.event_timeout_ms);
        if document_bytes >= self.large_file_bytes {
            base * self.large_file_multiplier
        } else {
            base
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid glob '{glob}' for server '{server}': {source}")]
    InvalidGlob {
        server: String,
        glob: String,
        source: globset::Error,
    },
}

/// Compiled path-glob → server-name routing table.
///
/// Overlapping globs resolve deterministically: server names are tried in
/// sorted order and the first match wins.
#[derive(Debug)]
pub struct ServerRouter {
    entries: Vec<(String, GlobSet)>,
}

impl ServerRouter {
    pub fn compile(config: &LspConfig) -> Result<Self, RouterError> {
        let mut names: Vec<&String> = config.servers.keys().collect();
        names.sort();

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let server = &config.servers[name];
            let mut builder = GlobSetBuilder::new();
            for glob in &server.file_globs {
                let compiled = Glob::new(glob).map_err(|source| RouterError::InvalidGlob {
                    server: name.clone(),
                    glob: glob.clone(),
                    source,
                })?;
                builder.add(compiled);
            }
            let set = builder.build().map_err(|source| RouterError::InvalidGlob {
                server: name.clone(),
                glob: server.file_globs.join(", "),
                source,
            })?;
            entries.push((name.clone(), set));
        }

        Ok(Self { entries })
    }

    /// The name of the server configured for `path`, if any.
    #[must_use]
    pub fn route(&self, path: &Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, set)| set.is_match(path))
            .map(|(name, _)| name.as_str())
    }
}
