//! JSON-RPC message shapes, request parameter builders, and the wire↔tool
//! type boundary.
//!
//! LSP positions are 0-based line/character; everything in `sextant-types`
//! is 1-based line/column. Every position crosses that boundary exactly once,
//! in this module: outgoing through [`wire_position`], incoming through
//! [`parse_position`].
//!
//! Servers are allowed to answer several requests with either of two valid
//! result shapes (flat vs. nested symbols, item array vs. completion list,
//! `changes` vs. `documentChanges`). Each `parse_*` function picks the shape
//! from the presence of its shape-defining field, never by trial
//! deserialization.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use sextant_types::{
    CodeActionInfo, CompletionEntry, Diagnostic, DiagnosticSeverity, FileEdit, HoverInfo, Location,
    Position, Range, SymbolNode, TextEdit,
};

use crate::error::ClientError;

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

// ── URI handling ─────────────────────────────────────────────────────────

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, ClientError> {
    url::Url::from_file_path(path).map_err(|()| ClientError::InvalidPath(path.to_path_buf()))
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}

// ── Position conversion (the 0-based/1-based boundary) ───────────────────

/// Convert a 1-based tool position to a 0-based wire position.
pub(crate) fn wire_position(pos: Position) -> Value {
    json!({
        "line": pos.line.saturating_sub(1),
        "character": pos.column.saturating_sub(1),
    })
}

/// Convert a 0-based wire position to a 1-based tool position.
fn parse_position(value: &Value) -> Option<Position> {
    let line = u32::try_from(value.get("line")?.as_u64()?).ok()?;
    let character = u32::try_from(value.get("character")?.as_u64()?).ok()?;
    Some(Position::new(line + 1, character + 1))
}

fn parse_range(value: &Value) -> Option<Range> {
    let start = parse_position(value.get("start")?)?;
    let end = parse_position(value.get("end")?)?;
    Some(Range::new(start, end))
}

fn wire_range(range: Range) -> Value {
    json!({
        "start": wire_position(range.start),
        "end": wire_position(range.end),
    })
}

// ── Request parameter builders ───────────────────────────────────────────

pub(crate) fn initialize_params(root_uri: &str, initialization_options: Option<&Value>) -> Value {
    let mut params = json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                },
                "publishDiagnostics": {
                    "relatedInformation": false
                },
                "hover": {
                    "contentFormat": ["markdown", "plaintext"]
                },
                "definition": { "linkSupport": true },
                "references": {},
                "rename": { "prepareSupport": false },
                "documentSymbol": {
                    "hierarchicalDocumentSymbolSupport": true
                },
                "completion": {
                    "completionItem": { "snippetSupport": false }
                },
                "codeAction": {},
                "formatting": {}
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    });
    if let Some(options) = initialization_options {
        params["initializationOptions"] = options.clone();
    }
    params
}

pub(crate) fn did_open_params(uri: &str, language_id: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri,
            "version": version
        },
        "contentChanges": [{
            "text": text
        }]
    })
}

pub(crate) fn did_close_params(uri: &str) -> Value {
    json!({
        "textDocument": { "uri": uri }
    })
}

pub(crate) fn did_change_configuration_params(settings: &Value) -> Value {
    json!({ "settings": settings })
}

pub(crate) fn text_document_position_params(uri: &str, pos: Position) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": wire_position(pos),
    })
}

pub(crate) fn references_params(uri: &str, pos: Position, include_declaration: bool) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": wire_position(pos),
        "context": { "includeDeclaration": include_declaration },
    })
}

pub(crate) fn rename_params(uri: &str, pos: Position, new_name: &str) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": wire_position(pos),
        "newName": new_name,
    })
}

pub(crate) fn document_symbol_params(uri: &str) -> Value {
    json!({
        "textDocument": { "uri": uri }
    })
}

pub(crate) fn completion_params(uri: &str, pos: Position) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": wire_position(pos),
    })
}

pub(crate) fn code_action_params(uri: &str, range: Range) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "range": wire_range(range),
        "context": { "diagnostics": [] },
    })
}

pub(crate) fn formatting_params(uri: &str, tab_size: u32, insert_spaces: bool) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "options": {
            "tabSize": tab_size,
            "insertSpaces": insert_spaces
        },
    })
}

// ── Incoming notification payloads ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<WireDiagnostic>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDiagnostic {
    pub range: WireRange,
    pub severity: Option<u64>,
    /// Servers send either a number or a string here.
    pub code: Option<Value>,
    pub source: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRange {
    pub start: WirePosition,
    pub end: WirePosition,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePosition {
    pub line: u32,
    pub character: u32,
}

impl WireRange {
    fn to_range(&self) -> Range {
        Range::new(
            Position::new(self.start.line + 1, self.start.character + 1),
            Position::new(self.end.line + 1, self.end.character + 1),
        )
    }
}

impl WireDiagnostic {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = self.code.as_ref().and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Diagnostic::new(
            self.severity
                .and_then(DiagnosticSeverity::from_lsp)
                .unwrap_or(DiagnosticSeverity::Warning),
            self.message.clone(),
            self.range.to_range(),
            code,
            self.source
                .clone()
                .unwrap_or_else(|| String::from("unknown")),
        )
    }
}

// ── Result normalization ─────────────────────────────────────────────────

fn shape_error(method: &'static str, detail: impl Into<String>) -> ClientError {
    ClientError::ResultShape {
        method,
        detail: detail.into(),
    }
}

/// `textDocument/hover` → contents are a string, a `MarkupContent`, a
/// `MarkedString`, or an array of the latter two.
pub(crate) fn parse_hover(result: &Value) -> Result<Option<HoverInfo>, ClientError> {
    const METHOD: &str = "textDocument/hover";
    if result.is_null() {
        return Ok(None);
    }
    let contents = result
        .get("contents")
        .ok_or_else(|| shape_error(METHOD, "missing 'contents'"))?;
    let rendered = render_hover_contents(contents)
        .ok_or_else(|| shape_error(METHOD, "unrecognized 'contents' shape"))?;
    let range = result.get("range").and_then(parse_range);
    Ok(Some(HoverInfo {
        contents: rendered,
        range,
    }))
}

fn render_hover_contents(contents: &Value) -> Option<String> {
    match contents {
        Value::String(s) => Some(s.clone()),
        // MarkupContent { kind, value } and MarkedString { language, value }
        // both carry the text in 'value'.
        Value::Object(map) => map.get("value")?.as_str().map(String::from),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_hover_contents).collect();
            Some(parts.join("\n\n"))
        }
        _ => None,
    }
}

/// `textDocument/definition` and friends → `Location | Location[] |
/// LocationLink[]`. A `targetUri` field marks the link variant.
pub(crate) fn parse_locations(
    method: &'static str,
    result: &Value,
) -> Result<Vec<Location>, ClientError> {
    match result {
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => {
            let loc = parse_one_location(result)
                .ok_or_else(|| shape_error(method, "unrecognized location object"))?;
            Ok(vec![loc])
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                parse_one_location(item)
                    .ok_or_else(|| shape_error(method, "unrecognized location element"))
            })
            .collect(),
        _ => Err(shape_error(method, "expected null, object, or array")),
    }
}

fn parse_one_location(value: &Value) -> Option<Location> {
    if let Some(target_uri) = value.get("targetUri").and_then(Value::as_str) {
        // LocationLink: prefer the selection range, fall back to the full range.
        let range = value
            .get("targetSelectionRange")
            .and_then(parse_range)
            .or_else(|| value.get("targetRange").and_then(parse_range))?;
        let path = file_uri_to_path(target_uri)?;
        return Some(Location { path, range });
    }
    let uri = value.get("uri")?.as_str()?;
    let range = parse_range(value.get("range")?)?;
    let path = file_uri_to_path(uri)?;
    Some(Location { path, range })
}

/// `textDocument/documentSymbol` → `SymbolInformation[]` (flat, has
/// `location`) or `DocumentSymbol[]` (nested, has `selectionRange`).
pub(crate) fn parse_document_symbols(result: &Value) -> Result<Vec<SymbolNode>, ClientError> {
    const METHOD: &str = "textDocument/documentSymbol";
    let items = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(shape_error(METHOD, "expected null or array")),
    };
    let Some(first) = items.first() else {
        return Ok(Vec::new());
    };

    if first.get("location").is_some() {
        items
            .iter()
            .map(|item| {
                parse_flat_symbol(item)
                    .ok_or_else(|| shape_error(METHOD, "malformed SymbolInformation"))
            })
            .collect()
    } else if first.get("selectionRange").is_some() || first.get("range").is_some() {
        items
            .iter()
            .map(|item| {
                parse_nested_symbol(item)
                    .ok_or_else(|| shape_error(METHOD, "malformed DocumentSymbol"))
            })
            .collect()
    } else {
        Err(shape_error(METHOD, "element matches neither symbol shape"))
    }
}

fn parse_flat_symbol(value: &Value) -> Option<SymbolNode> {
    let name = value.get("name")?.as_str()?.to_string();
    let kind = u32::try_from(value.get("kind")?.as_u64()?).ok()?;
    let range = parse_range(value.get("location")?.get("range")?)?;
    let container = value
        .get("containerName")
        .and_then(Value::as_str)
        .map(String::from);
    Some(SymbolNode {
        name,
        kind,
        range,
        container,
        children: Vec::new(),
    })
}

fn parse_nested_symbol(value: &Value) -> Option<SymbolNode> {
    let name = value.get("name")?.as_str()?.to_string();
    let kind = u32::try_from(value.get("kind")?.as_u64()?).ok()?;
    let range = parse_range(value.get("range")?)?;
    let children = match value.get("children") {
        Some(Value::Array(items)) => items
            .iter()
            .map(parse_nested_symbol)
            .collect::<Option<Vec<_>>>()?,
        _ => Vec::new(),
    };
    Some(SymbolNode {
        name,
        kind,
        range,
        container: None,
        children,
    })
}

/// `textDocument/completion` → `CompletionItem[]` or `CompletionList`.
pub(crate) fn parse_completions(result: &Value) -> Result<Vec<CompletionEntry>, ClientError> {
    const METHOD: &str = "textDocument/completion";
    let items = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(shape_error(METHOD, "object without 'items' array")),
        },
        _ => return Err(shape_error(METHOD, "expected null, array, or list object")),
    };

    items
        .iter()
        .map(|item| {
            let label = item
                .get("label")
                .and_then(Value::as_str)
                .ok_or_else(|| shape_error(METHOD, "completion item without label"))?;
            Ok(CompletionEntry {
                label: label.to_string(),
                kind: item
                    .get("kind")
                    .and_then(Value::as_u64)
                    .and_then(|k| u32::try_from(k).ok()),
                detail: item
                    .get("detail")
                    .and_then(Value::as_str)
                    .map(String::from),
                insert_text: item
                    .get("insertText")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        })
        .collect()
}

/// `textDocument/rename` → a `WorkspaceEdit` carrying either `changes`
/// (uri → edits map) or `documentChanges` (versioned edit list).
pub(crate) fn parse_workspace_edit(result: &Value) -> Result<Vec<FileEdit>, ClientError> {
    const METHOD: &str = "textDocument/rename";
    if result.is_null() {
        return Ok(Vec::new());
    }

    if let Some(Value::Object(changes)) = result.get("changes") {
        let mut file_edits = Vec::with_capacity(changes.len());
        for (uri, edits) in changes {
            let path = file_uri_to_path(uri)
                .ok_or_else(|| shape_error(METHOD, format!("non-file uri '{uri}'")))?;
            file_edits.push(FileEdit {
                path,
                edits: parse_text_edits(METHOD, edits)?,
            });
        }
        // Map iteration order is arbitrary; sort for a deterministic result.
        file_edits.sort_by(|a, b| a.path.cmp(&b.path));
        return Ok(file_edits);
    }

    if let Some(Value::Array(doc_changes)) = result.get("documentChanges") {
        let mut file_edits = Vec::new();
        for change in doc_changes {
            // Resource operations (create/rename/delete) carry a 'kind'
            // field and no edits; they are outside the tool contract.
            if change.get("kind").is_some() {
                continue;
            }
            let uri = change
                .get("textDocument")
                .and_then(|td| td.get("uri"))
                .and_then(Value::as_str)
                .ok_or_else(|| shape_error(METHOD, "documentChanges entry without uri"))?;
            let path = file_uri_to_path(uri)
                .ok_or_else(|| shape_error(METHOD, format!("non-file uri '{uri}'")))?;
            let edits = change
                .get("edits")
                .ok_or_else(|| shape_error(METHOD, "documentChanges entry without edits"))?;
            file_edits.push(FileEdit {
                path,
                edits: parse_text_edits(METHOD, edits)?,
            });
        }
        return Ok(file_edits);
    }

    Err(shape_error(
        METHOD,
        "workspace edit has neither 'changes' nor 'documentChanges'",
    ))
}

/// A bare `TextEdit[]` (formatting results, workspace-edit entries).
pub(crate) fn parse_text_edits(
    method: &'static str,
    result: &Value,
) -> Result<Vec<TextEdit>, ClientError> {
    let items = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(shape_error(method, "expected null or edit array")),
    };
    items
        .iter()
        .map(|item| {
            let range = item
                .get("range")
                .and_then(parse_range)
                .ok_or_else(|| shape_error(method, "edit without range"))?;
            let new_text = item
                .get("newText")
                .and_then(Value::as_str)
                .ok_or_else(|| shape_error(method, "edit without newText"))?;
            Ok(TextEdit {
                range,
                new_text: new_text.to_string(),
            })
        })
        .collect()
}

/// `textDocument/codeAction` → array of `Command` or `CodeAction`.
pub(crate) fn parse_code_actions(result: &Value) -> Result<Vec<CodeActionInfo>, ClientError> {
    const METHOD: &str = "textDocument/codeAction";
    let items = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(shape_error(METHOD, "expected null or array")),
    };
    items
        .iter()
        .map(|item| {
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| shape_error(METHOD, "action without title"))?;
            Ok(CodeActionInfo {
                title: title.to_string(),
                kind: item.get("kind").and_then(Value::as_str).map(String::from),
                is_preferred: item
                    .get("isPreferred")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}
