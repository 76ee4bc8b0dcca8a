//! The diagnostics engine.
//!
//! Diagnostics are buffered in emission order and rendered as
//! `path(line,col): severity: message`, optionally ANSI-coloured. Any
//! `error`, `fatal` or `ice` diagnostic sets `has_reported_errors`;
//! analysis keeps going unless the failure is one of the fatal classes
//! (dependency cycles), which the analyser handles by returning early.

use std::io::{self, Write};

use colored::Colorize;

use crate::source::SourceMap;
use crate::span::Location;

/// Diagnostic severity, in increasing order of gravity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Note,
    Warn,
    Error,
    Fatal,
    /// Internal compiler error: an invariant the compiler itself broke.
    Ice,
}

impl Severity {
    /// The label printed between the location and the message.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Note => "note",
            Severity::Warn => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Ice => "internal compiler error",
        }
    }

    /// Whether this severity marks the compilation as failed.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal | Severity::Ice)
    }

    fn colorize(self, label: &str) -> String {
        match self {
            Severity::Info => label.cyan().to_string(),
            Severity::Note => label.green().to_string(),
            Severity::Warn => label.yellow().to_string(),
            Severity::Error => label.red().to_string(),
            Severity::Fatal | Severity::Ice => label.red().bold().to_string(),
        }
    }
}

/// A single reported diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

/// Buffers diagnostics for a compilation and renders them on demand.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    has_reported_errors: bool,
    /// Render ANSI colour codes.
    pub use_color: bool,
    /// Render raw byte offsets instead of line/column pairs.
    pub use_byte_positions: bool,
}

impl DiagnosticEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a diagnostic.
    pub fn emit(&mut self, severity: Severity, location: Location, message: impl Into<String>) {
        if severity.is_error() {
            self.has_reported_errors = true;
        }
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message: message.into(),
        });
    }

    pub fn info(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Info, location, message);
    }

    pub fn note(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Note, location, message);
    }

    pub fn warn(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Warn, location, message);
    }

    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Error, location, message);
    }

    pub fn fatal(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Fatal, location, message);
    }

    pub fn ice(&mut self, location: Location, message: impl Into<String>) {
        self.emit(Severity::Ice, location, message);
    }

    /// True once any `error`/`fatal`/`ice` has been reported.
    #[must_use]
    pub fn has_reported_errors(&self) -> bool {
        self.has_reported_errors
    }

    /// All diagnostics in emission order.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Count of diagnostics at exactly `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Render one diagnostic as a line, without trailing newline.
    #[must_use]
    pub fn render(&self, diagnostic: &Diagnostic, sources: &SourceMap) -> String {
        let mut prefix = String::new();
        if let Some(file) = sources.get(diagnostic.location.source) {
            if self.use_byte_positions {
                prefix = format!("{}[{}]", file.name, diagnostic.location.span.start);
            } else {
                let (line, col) = file.line_col(diagnostic.location.span.start);
                prefix = format!("{}({line},{col})", file.name);
            }
        }

        let label = if self.use_color {
            diagnostic.severity.colorize(diagnostic.severity.label())
        } else {
            diagnostic.severity.label().to_string()
        };

        if prefix.is_empty() {
            format!("{label}: {}", diagnostic.message)
        } else {
            format!("{prefix}: {label}: {}", diagnostic.message)
        }
    }

    /// Write every buffered diagnostic to `out`, one per line.
    pub fn write_all(&self, sources: &SourceMap, out: &mut dyn Write) -> io::Result<()> {
        for diagnostic in &self.diagnostics {
            writeln!(out, "{}", self.render(diagnostic, sources))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{SourceId, Span};

    fn loc(source: SourceId, start: u32) -> Location {
        Location::new(source, Span::with_len(start, 1))
    }

    #[test]
    fn errors_set_the_flag() {
        let mut engine = DiagnosticEngine::new();
        assert!(!engine.has_reported_errors());
        engine.warn(Location::detached(), "just a warning");
        assert!(!engine.has_reported_errors());
        engine.error(Location::detached(), "now an error");
        assert!(engine.has_reported_errors());
    }

    #[test]
    fn render_uses_line_and_column() {
        let mut sources = SourceMap::new();
        let id = sources.add("lib/io.sb", "a\nbcd\n");
        let mut engine = DiagnosticEngine::new();
        engine.error(loc(id, 4), "unknown identifier 'c'");

        let line = engine.render(&engine.diagnostics()[0], &sources);
        assert_eq!(line, "lib/io.sb(2,3): error: unknown identifier 'c'");
    }

    #[test]
    fn render_byte_positions_when_configured() {
        let mut sources = SourceMap::new();
        let id = sources.add("m.sb", "xyz");
        let mut engine = DiagnosticEngine::new();
        engine.use_byte_positions = true;
        engine.note(loc(id, 2), "declared here");

        let line = engine.render(&engine.diagnostics()[0], &sources);
        assert_eq!(line, "m.sb[2]: note: declared here");
    }

    #[test]
    fn detached_locations_render_without_a_path() {
        let sources = SourceMap::new();
        let mut engine = DiagnosticEngine::new();
        engine.fatal(Location::detached(), "import cycle");
        let line = engine.render(&engine.diagnostics()[0], &sources);
        assert_eq!(line, "fatal: import cycle");
    }
}
