//! Results of capability requests, as handed to tools.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::position::Range;

/// Hover information for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverInfo {
    /// Rendered hover text. Markup is flattened to its raw string value.
    pub contents: String,
    /// The range the hover applies to, when the server reports one.
    pub range: Option<Range>,
}

/// One node in a document symbol outline.
///
/// Servers return either a flat list (each symbol carries its location and
/// container name) or a nested tree. Both shapes normalize to this type:
/// flat results become root-level nodes with no children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: String,
    /// Raw LSP symbol kind (1..=26). See [`symbol_kind_label`].
    pub kind: u32,
    pub range: Range,
    /// Containing symbol name, only present for flat results.
    pub container: Option<String>,
    pub children: Vec<SymbolNode>,
}

/// Human-readable label for an LSP symbol kind.
#[must_use]
pub fn symbol_kind_label(kind: u32) -> &'static str {
    match kind {
        1 => "file",
        2 => "module",
        3 => "namespace",
        4 => "package",
        5 => "class",
        6 => "method",
        7 => "property",
        8 => "field",
        9 => "constructor",
        10 => "enum",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        15 => "string",
        16 => "number",
        17 => "boolean",
        18 => "array",
        19 => "object",
        20 => "key",
        21 => "null",
        22 => "enum member",
        23 => "struct",
        24 => "event",
        25 => "operator",
        26 => "type parameter",
        _ => "unknown",
    }
}

/// A single completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub label: String,
    /// Raw LSP completion item kind, when reported.
    pub kind: Option<u32>,
    pub detail: Option<String>,
    /// Text to insert; falls back to `label` when the server omits it.
    pub insert_text: Option<String>,
}

/// A single text replacement inside one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// All edits a workspace operation (rename, code action) applies to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: PathBuf,
    pub edits: Vec<TextEdit>,
}

/// A code action or command offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeActionInfo {
    pub title: String,
    /// Action kind (e.g. "quickfix", "refactor.extract"), when reported.
    pub kind: Option<String>,
    pub is_preferred: bool,
}
