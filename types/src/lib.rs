//! Tool-facing domain types for the sextant LSP adapter.
//!
//! This crate contains pure domain types with no IO and no async. Everything
//! the client facade returns to tool implementations lives here, along with
//! the configuration structs the host deserializes and hands to the client.
//!
//! Positions in this crate are **1-based** (line and column). The LSP wire
//! format is 0-based; `sextant-lsp` converts exactly once at its protocol
//! boundary.

mod capability;
mod config;
mod diagnostic;
mod env;
mod position;

pub use capability::{
    CodeActionInfo, CompletionEntry, FileEdit, HoverInfo, SymbolNode, TextEdit, symbol_kind_label,
};
pub use config::{
    DiagnosticsConfig, LspConfig, RouterError, ServerConfig, ServerRouter, TimeoutConfig,
};
pub use diagnostic::{Diagnostic, DiagnosticSet, DiagnosticSeverity, DiagnosticsOrigin};
pub use env::ENV_SECRET_DENYLIST;
pub use position::{Location, Position, Range};
