//! Diagnostics as reported to tools.

use std::path::{Path, PathBuf};

use crate::position::Range;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    /// Convert from LSP numeric severity (1=Error, 2=Warning, 3=Info, 4=Hint).
    ///
    /// Returns `None` for values outside the LSP-defined range.
    /// Callers (boundary code) decide the fallback policy.
    #[must_use]
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// A single diagnostic from a language server.
///
/// Fields are private; construction goes through [`Diagnostic::new`] and
/// consumers read via accessors. The range is 1-based like every position
/// in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    message: String,
    range: Range,
    /// Diagnostic code as reported by the server (e.g. "E0308"), if any.
    code: Option<String>,
    /// Source of the diagnostic (e.g. "rustc", "typescript").
    /// Resolved to a concrete string at the boundary.
    source: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        message: String,
        range: Range,
        code: Option<String>,
        source: String,
    ) -> Self {
        Self {
            severity,
            message,
            range,
            code,
            source,
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `path:line:col: severity: message` for display.
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.range.start.line,
            self.range.start.column,
            self.severity.label(),
            self.source,
            self.message,
        )
    }
}

/// How a [`DiagnosticSet`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticsOrigin {
    /// Delivered by a `textDocument/publishDiagnostics` notification.
    Pushed,
    /// Confirmed by the polling fallback after no push arrived.
    Polled,
}

/// The latest known diagnostics for one document.
///
/// There is no history retention; each set replaces the previous one for
/// the same path.
#[derive(Debug, Clone)]
pub struct DiagnosticSet {
    path: PathBuf,
    diagnostics: Vec<Diagnostic>,
    origin: DiagnosticsOrigin,
}

impl DiagnosticSet {
    #[must_use]
    pub fn new(path: PathBuf, diagnostics: Vec<Diagnostic>, origin: DiagnosticsOrigin) -> Self {
        Self {
            path,
            diagnostics,
            origin,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn origin(&self) -> DiagnosticsOrigin {
        self.origin
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn count_by_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Warning)
    }

    /// Format a compact status string like "E:3 W:5".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn make_diag(severity: DiagnosticSeverity, msg: &str) -> Diagnostic {
        Diagnostic::new(
            severity,
            msg.to_string(),
            Range::new(Position::new(11, 6), Position::new(11, 12)),
            None,
            "rustc".to_string(),
        )
    }

    #[test]
    fn test_from_lsp_known_values() {
        assert_eq!(
            DiagnosticSeverity::from_lsp(1),
            Some(DiagnosticSeverity::Error)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(2),
            Some(DiagnosticSeverity::Warning)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(3),
            Some(DiagnosticSeverity::Information)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(4),
            Some(DiagnosticSeverity::Hint)
        );
    }

    #[test]
    fn test_from_lsp_unknown_returns_none() {
        assert_eq!(DiagnosticSeverity::from_lsp(0), None);
        assert_eq!(DiagnosticSeverity::from_lsp(99), None);
    }

    #[test]
    fn test_display_with_path() {
        let diag = make_diag(DiagnosticSeverity::Error, "expected `;`");
        assert_eq!(
            diag.display_with_path(Path::new("src/main.rs")),
            "src/main.rs:11:6: error: [rustc] expected `;`"
        );
    }

    #[test]
    fn test_set_counts() {
        let set = DiagnosticSet::new(
            PathBuf::from("a.rs"),
            vec![
                make_diag(DiagnosticSeverity::Error, "e1"),
                make_diag(DiagnosticSeverity::Error, "e2"),
                make_diag(DiagnosticSeverity::Warning, "w1"),
                make_diag(DiagnosticSeverity::Hint, "h1"),
            ],
            DiagnosticsOrigin::Pushed,
        );
        assert_eq!(set.error_count(), 2);
        assert_eq!(set.warning_count(), 1);
        assert_eq!(set.status_string(), "E:2 W:1");
        assert!(!set.is_empty());
    }

    #[test]
    fn test_empty_set_status_string() {
        let set = DiagnosticSet::new(PathBuf::from("a.rs"), vec![], DiagnosticsOrigin::Polled);
        assert!(set.is_empty());
        assert_eq!(set.status_string(), "");
        assert_eq!(set.origin(), DiagnosticsOrigin::Polled);
    }
}
