//! Per-document open state and version tracking.
//!
//! [`DocumentStore`] is a synchronous state machine: every mutation returns
//! the [`SyncAction`] the caller must send to the server. Keeping the
//! decision pure makes the version-monotonicity invariants directly
//! testable; the client facade owns the IO.
//!
//! Invariants: the version sent to the server never decreases while a
//! document is open; reopening after a close restarts at version 1, and a
//! `didClose` is always emitted before the reopen's `didOpen`.

use std::collections::HashMap;

/// The notification the caller must send after a store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SyncAction {
    /// Send `textDocument/didOpen` with this version.
    Open { version: i32 },
    /// Send `textDocument/didChange` with this version.
    Change { version: i32 },
    /// Send `textDocument/didClose`.
    Close,
    /// Nothing to send.
    None,
}

#[derive(Debug)]
struct DocumentState {
    version: i32,
    content: String,
    open: bool,
}

#[derive(Debug, Default)]
pub(crate) struct DocumentStore {
    docs: HashMap<String, DocumentState>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            docs: HashMap::new(),
        }
    }

    /// Ensure the document is open with `content`.
    ///
    /// No-op when already open with identical content. An open document
    /// with different content gets a `didChange` (a second `didOpen` while
    /// the server considers the document open would desync it). Closed or
    /// unknown documents open at version 1.
    pub fn open(&mut self, uri: &str, content: &str) -> SyncAction {
        if let Some(doc) = self.docs.get_mut(uri)
            && doc.open
        {
            if doc.content == content {
                return SyncAction::None;
            }
            doc.version += 1;
            doc.content = content.to_string();
            return SyncAction::Change {
                version: doc.version,
            };
        }
        self.docs.insert(
            uri.to_string(),
            DocumentState {
                version: 1,
                content: content.to_string(),
                open: true,
            },
        );
        SyncAction::Open { version: 1 }
    }

    /// Replace the document's content, incrementing the version.
    ///
    /// `forced_version` is adopted only when it is at least `current + 1`;
    /// anything lower is ignored so the version sent to the server never
    /// goes backwards. Updating a closed or unknown document opens it.
    pub fn update(&mut self, uri: &str, content: &str, forced_version: Option<i32>) -> SyncAction {
        if let Some(doc) = self.docs.get_mut(uri)
            && doc.open
        {
            let next = doc.version + 1;
            doc.version = match forced_version {
                Some(forced) if forced >= next => forced,
                _ => next,
            };
            doc.content = content.to_string();
            return SyncAction::Change {
                version: doc.version,
            };
        }
        self.open(uri, content)
    }

    /// Mark the document closed.
    ///
    /// Returns [`SyncAction::None`] when the server never saw it open.
    pub fn close(&mut self, uri: &str) -> SyncAction {
        if let Some(doc) = self.docs.get_mut(uri)
            && doc.open
        {
            doc.open = false;
            return SyncAction::Close;
        }
        SyncAction::None
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.docs.get(uri).is_some_and(|doc| doc.open)
    }

    /// Byte length of the open document's content, for diagnostics
    /// event-window scaling.
    pub fn content_len(&self, uri: &str) -> usize {
        self.docs
            .get(uri)
            .filter(|doc| doc.open)
            .map_or(0, |doc| doc.content.len())
    }

    #[cfg(test)]
    fn version(&self, uri: &str) -> Option<i32> {
        self.docs.get(uri).map(|doc| doc.version)
    }
}
