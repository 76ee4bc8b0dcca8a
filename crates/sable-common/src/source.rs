//! Source registry and offset -> line/column conversion.
//!
//! The AST and diagnostics work in byte offsets; terminal output wants
//! 1-based line/column pairs. A `LineMap` remembers where each line
//! begins so a diagnostic offset resolves with one ordered lookup.

use crate::span::{SourceId, Span};

/// Where each line of a source file begins.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Byte offset of the first character of every line; a file always
    /// has at least line 0 starting at offset 0.
    starts: Vec<u32>,
}

impl LineMap {
    /// Record the line starts of `text`. Only `\n` ends a line; spans
    /// are byte ranges, so the scan works on bytes too.
    #[must_use]
    pub fn build(text: &str) -> Self {
        let mut starts = vec![0u32];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(u32::try_from(offset + 1).unwrap_or(u32::MAX));
            }
        }
        Self { starts }
    }

    /// Resolve a byte offset to a 1-based (line, column) pair. Columns
    /// count bytes from the line start, which is how the compiler's
    /// terminal output has always counted.
    #[must_use]
    pub fn offset_to_line_col(&self, offset: u32) -> (u32, u32) {
        // Count the lines beginning at or before the offset; the
        // containing line is the last of them.
        let line = self
            .starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let column = offset.saturating_sub(self.starts[line]);
        (u32::try_from(line).unwrap_or(u32::MAX) + 1, column + 1)
    }

    /// Get the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte offset where the 0-based `line` begins.
    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.starts.get(line).copied()
    }
}

/// A registered source file: name, full text, and its line map.
#[derive(Debug)]
pub struct SourceFile {
    pub id: SourceId,
    pub name: String,
    pub text: String,
    line_map: LineMap,
}

impl SourceFile {
    /// Slice the text covered by a span.
    #[must_use]
    pub fn slice(&self, span: Span) -> &str {
        span.text(&self.text)
    }

    /// 1-based (line, column) of a byte offset in this file.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        self.line_map.offset_to_line_col(offset)
    }
}

/// The per-compilation registry of source files.
///
/// Sources are append-only; a `SourceId` stays valid for the life of the
/// owning context.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Register a source file, returning its id.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        let id = SourceId(u32::try_from(self.files.len()).unwrap_or(u32::MAX));
        let text = text.into();
        let line_map = LineMap::build(&text);
        self.files.push(SourceFile {
            id,
            name: name.into(),
            text,
            line_map,
        });
        id
    }

    /// Look up a source by id.
    #[must_use]
    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    /// Find a registered source by exact name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_based() {
        let map = LineMap::build("ab\ncd\n");
        assert_eq!(map.offset_to_line_col(0), (1, 1));
        assert_eq!(map.offset_to_line_col(1), (1, 2));
        assert_eq!(map.offset_to_line_col(3), (2, 1));
        assert_eq!(map.offset_to_line_col(4), (2, 2));
    }

    #[test]
    fn offsets_past_last_newline_stay_on_last_line() {
        let map = LineMap::build("one\ntwo");
        assert_eq!(map.offset_to_line_col(6), (2, 3));
        assert_eq!(map.line_count(), 2);
        assert_eq!(map.line_start(1), Some(4));
        assert_eq!(map.line_start(5), None);
    }

    #[test]
    fn an_offset_on_a_newline_belongs_to_the_line_it_ends() {
        let map = LineMap::build("ab\ncd\n");
        assert_eq!(map.offset_to_line_col(2), (1, 3));
        assert_eq!(map.offset_to_line_col(5), (2, 3));
    }

    #[test]
    fn source_map_round_trip() {
        let mut sources = SourceMap::new();
        let id = sources.add("main.sb", "int main() {}\n");
        let file = sources.get(id).unwrap();
        assert_eq!(file.name, "main.sb");
        assert_eq!(file.slice(Span::new(0, 3)), "int");
        assert!(sources.find_by_name("main.sb").is_some());
        assert!(sources.find_by_name("other.sb").is_none());
    }
}
