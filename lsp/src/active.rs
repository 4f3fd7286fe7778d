//! Process-wide active-client slot.
//!
//! The primary ownership model is explicit: [`crate::LspClient::start`]
//! returns an `Arc` that callers pass to tool implementations. This module
//! is the thin transitional accessor for tool code that cannot thread a
//! client reference through every call. It holds no state of its own beyond
//! the slot: exactly one client may be current, and installing a new one
//! tears the previous one down first so no subprocess is orphaned.

use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::client::LspClient;

fn slot() -> &'static Mutex<Option<Arc<LspClient>>> {
    static SLOT: OnceLock<Mutex<Option<Arc<LspClient>>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Install `client` as the process-wide active client.
///
/// Any previously installed client is shut down first; its shutdown
/// outcome is logged, not propagated, since the replacement must proceed
/// either way. The install/shutdown transition holds the slot lock, so
/// concurrent installs serialize.
pub async fn install(client: Arc<LspClient>) {
    let mut current = slot().lock().await;
    if let Some(previous) = current.take()
        && let Err(e) = previous.shutdown().await
    {
        tracing::warn!(
            server = %previous.server_name(),
            "shutting down replaced client: {e}"
        );
    }
    *current = Some(client);
}

/// The currently active client, if one is installed and its process is
/// still running. A dead client is evicted rather than returned, so
/// callers fail fast with a fresh error instead of hanging on a corpse.
pub async fn current() -> Option<Arc<LspClient>> {
    let mut current = slot().lock().await;
    match current.as_ref() {
        Some(client) if client.is_alive() => Some(Arc::clone(client)),
        Some(_) => {
            *current = None;
            None
        }
        None => None,
    }
}

/// Shut down and remove the active client, if any.
pub async fn clear() {
    let mut current = slot().lock().await;
    if let Some(client) = current.take()
        && let Err(e) = client.shutdown().await
    {
        tracing::warn!(server = %client.server_name(), "shutting down client: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sextant_types::{LspConfig, ServerConfig};
    use std::path::PathBuf;

    /// The far end of the duplex is returned so the client doesn't observe
    /// EOF (and die) while the test still needs it alive.
    fn make_client(name: &str) -> (Arc<LspClient>, tokio::io::DuplexStream) {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (read, write) = tokio::io::split(client_io);
        let server: ServerConfig = serde_json::from_value(json!({
            "command": "fake-ls",
            "language_id": "rust"
        }))
        .unwrap();
        let config: LspConfig = serde_json::from_value(json!({
            "timeouts": { "shutdown_grace_ms": 50, "request_secs": 1 }
        }))
        .unwrap();
        #[cfg(windows)]
        let root = PathBuf::from(r"C:\test");
        #[cfg(not(windows))]
        let root = PathBuf::from("/test");
        let client = LspClient::from_streams(write, read, None, name, &server, &config, &root);
        (client, server_io)
    }

    // One test drives the whole lifecycle: the slot is process-global, so
    // splitting these into parallel tests would race.
    #[tokio::test]
    async fn test_install_current_replace_clear_lifecycle() {
        assert!(current().await.is_none());

        let (first, _first_io) = make_client("first");
        install(Arc::clone(&first)).await;
        let looked_up = current().await.unwrap();
        assert_eq!(looked_up.server_name(), "first");

        // Installing a replacement tears the first down.
        let (second, _second_io) = make_client("second");
        install(Arc::clone(&second)).await;
        assert!(!first.is_alive());
        assert_eq!(current().await.unwrap().server_name(), "second");

        clear().await;
        assert!(current().await.is_none());
        assert!(!second.is_alive());

        // A dead client is evicted instead of returned.
        let (third, _third_io) = make_client("third");
        install(Arc::clone(&third)).await;
        let _ = third.shutdown().await;
        assert!(current().await.is_none());
    }
}
