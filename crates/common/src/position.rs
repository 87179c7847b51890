//! Line/column ↔ absolute offset translation.
//!
//! Offsets and columns count Unicode scalar values (`char`s), lines and
//! columns are 0-indexed. Conversions never clamp: a column past the end of
//! its line or an offset inside a line separator is an error, so callers can
//! rely on exact round-tripping.

use serde::{Deserialize, Serialize};

/// Position in a text blob (0-indexed line and column).
///
/// Ordering is line first, then column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Span between two positions, both ends inclusive for containment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// `start <= pos <= end`, compared line first then column.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("line {line} out of bounds (text has {line_count} lines)")]
    LineOutOfBounds { line: usize, line_count: usize },
    #[error("column {column} exceeds length {len} of line {line}")]
    ColumnOutOfBounds { line: usize, column: usize, len: usize },
    #[error("offset {offset} out of bounds (text length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },
    #[error("offset {offset} points inside the separator ending line {line}")]
    InsideSeparator { offset: usize, line: usize },
}

/// Line-ending style of a text blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineSeparator {
    #[default]
    Lf,
    CrLf,
}

impl LineSeparator {
    /// Decides by the first newline in `text`; text without one is `Lf`.
    ///
    /// ```
    /// # use common::LineSeparator;
    /// assert_eq!(LineSeparator::detect("a\r\nb\nc"), LineSeparator::CrLf);
    /// assert_eq!(LineSeparator::detect("a\nb\r\nc"), LineSeparator::Lf);
    /// assert_eq!(LineSeparator::detect("abc"), LineSeparator::Lf);
    /// ```
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => LineSeparator::CrLf,
            _ => LineSeparator::Lf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineSeparator::Lf => "\n",
            LineSeparator::CrLf => "\r\n",
        }
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.as_str().len()
    }
}

/// Per-line lengths plus cumulative line starts for one text blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    separator: LineSeparator,
    lengths: Vec<usize>,
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let separator = LineSeparator::detect(text);
        let lengths = text
            .split(separator.as_str())
            .map(|line| line.chars().count())
            .collect();
        Self::from_lengths(separator, lengths)
    }

    /// Builds the index from precomputed line lengths (separators excluded).
    pub fn from_lengths(separator: LineSeparator, mut lengths: Vec<usize>) -> Self {
        if lengths.is_empty() {
            lengths.push(0);
        }
        let mut starts = Vec::with_capacity(lengths.len());
        let mut acc = 0;
        for len in &lengths {
            starts.push(acc);
            acc += len + separator.len();
        }
        Self {
            separator,
            lengths,
            starts,
        }
    }

    pub fn separator(&self) -> LineSeparator {
        self.separator
    }

    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn line_len(&self, line: usize) -> Option<usize> {
        self.lengths.get(line).copied()
    }

    /// Total length of the text in chars.
    pub fn len(&self) -> usize {
        let last = self.lengths.len() - 1;
        self.starts[last] + self.lengths[last]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position_to_offset(&self, pos: Position) -> Result<usize, TranslateError> {
        let len = self
            .line_len(pos.line)
            .ok_or(TranslateError::LineOutOfBounds {
                line: pos.line,
                line_count: self.line_count(),
            })?;
        if pos.column > len {
            return Err(TranslateError::ColumnOutOfBounds {
                line: pos.line,
                column: pos.column,
                len,
            });
        }
        Ok(self.starts[pos.line] + pos.column)
    }

    pub fn offset_to_position(&self, offset: usize) -> Result<Position, TranslateError> {
        let total = self.len();
        if offset > total {
            return Err(TranslateError::OffsetOutOfBounds { offset, len: total });
        }
        // `starts[0] == 0`, so at least one start is <= offset.
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let column = offset - self.starts[line];
        if column > self.lengths[line] {
            return Err(TranslateError::InsideSeparator { offset, line });
        }
        Ok(Position { line, column })
    }

    pub fn last_position(&self) -> Position {
        let line = self.lengths.len() - 1;
        Position {
            line,
            column: self.lengths[line],
        }
    }

    /// Range covering the whole text.
    pub fn full_range(&self) -> Range {
        Range::new(Position::default(), self.last_position())
    }
}

/// Position just past the final character of `text`.
///
/// This is the end of the range a whole-file replacement covers.
pub fn last_position(text: &str, separator: LineSeparator) -> Position {
    let sep = separator.as_str();
    match text.rfind(sep) {
        Some(i) => Position {
            line: text.matches(sep).count(),
            column: text[i + sep.len()..].chars().count(),
        },
        None => Position {
            line: 0,
            column: text.chars().count(),
        },
    }
}

/// Byte index of the `offset`-th char, or `text.len()` for the end offset.
pub fn char_to_byte(text: &str, offset: usize) -> Option<usize> {
    match text.char_indices().nth(offset) {
        Some((i, _)) => Some(i),
        None if offset == text.chars().count() => Some(text.len()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offset_of_line_start() {
        let index = LineIndex::new("Hello\nWorld");
        assert_eq!(index.position_to_offset(Position::new(1, 0)).unwrap(), 6);
        assert_eq!(index.offset_to_position(6).unwrap(), Position::new(1, 0));
    }

    #[test]
    fn test_crlf_counts_two_chars() {
        let index = LineIndex::new("ab\r\ncd\r\nef");
        assert_eq!(index.separator(), LineSeparator::CrLf);
        assert_eq!(index.position_to_offset(Position::new(2, 1)).unwrap(), 9);
        assert_eq!(index.len(), 10);
    }

    #[test]
    fn test_column_past_line_end_fails() {
        let index = LineIndex::new("ab\ncd");
        let err = index.position_to_offset(Position::new(0, 3)).unwrap_err();
        assert_eq!(
            err,
            TranslateError::ColumnOutOfBounds {
                line: 0,
                column: 3,
                len: 2
            }
        );
        assert!(index.position_to_offset(Position::new(5, 0)).is_err());
    }

    #[test]
    fn test_offset_inside_crlf_fails() {
        let index = LineIndex::new("ab\r\ncd");
        // offset 2 is the end of line 0, offset 3 sits between '\r' and '\n'.
        assert_eq!(index.offset_to_position(2).unwrap(), Position::new(0, 2));
        assert_eq!(
            index.offset_to_position(3).unwrap_err(),
            TranslateError::InsideSeparator { offset: 3, line: 0 }
        );
        assert!(index.offset_to_position(7).is_err());
    }

    #[test]
    fn test_multibyte_chars_count_once() {
        let index = LineIndex::new("é🚀x\ny");
        assert_eq!(index.line_len(0), Some(3));
        assert_eq!(index.position_to_offset(Position::new(1, 1)).unwrap(), 5);
        assert_eq!(char_to_byte("é🚀x", 2), Some(6));
        assert_eq!(char_to_byte("é🚀x", 3), Some(7));
        assert_eq!(char_to_byte("é🚀x", 4), None);
    }

    #[test]
    fn test_last_position() {
        assert_eq!(last_position("a\nbc", LineSeparator::Lf), Position::new(1, 2));
        assert_eq!(last_position("a\nbc\n", LineSeparator::Lf), Position::new(2, 0));
        assert_eq!(last_position("abc", LineSeparator::CrLf), Position::new(0, 3));
        assert_eq!(
            LineIndex::new("a\r\nbc").last_position(),
            last_position("a\r\nbc", LineSeparator::CrLf)
        );
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = Range::new(Position::new(1, 4), Position::new(3, 2));
        assert!(range.contains(Position::new(1, 4)));
        assert!(range.contains(Position::new(2, 0)));
        assert!(range.contains(Position::new(2, 99)));
        assert!(range.contains(Position::new(3, 2)));
        assert!(!range.contains(Position::new(1, 3)));
        assert!(!range.contains(Position::new(3, 3)));
        assert!(!range.contains(Position::new(0, 9)));
    }

    #[test]
    fn test_from_lengths_matches_new() {
        let text = "one\ntwo\n\nfour";
        let built = LineIndex::from_lengths(LineSeparator::Lf, vec![3, 3, 0, 4]);
        assert_eq!(built, LineIndex::new(text));
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec("[a-zé🚀 ]{0,8}", 1..6),
            prop::bool::ANY,
        )
            .prop_map(|(lines, crlf)| lines.join(if crlf { "\r\n" } else { "\n" }))
    }

    proptest! {
        #[test]
        fn prop_offset_roundtrip(text in text_strategy()) {
            let index = LineIndex::new(&text);
            for offset in 0..=index.len() {
                if let Ok(pos) = index.offset_to_position(offset) {
                    prop_assert_eq!(index.position_to_offset(pos).unwrap(), offset);
                }
            }
        }

        #[test]
        fn prop_position_roundtrip(text in text_strategy()) {
            let index = LineIndex::new(&text);
            for line in 0..index.line_count() {
                for column in 0..=index.line_len(line).unwrap() {
                    let pos = Position::new(line, column);
                    let offset = index.position_to_offset(pos).unwrap();
                    prop_assert_eq!(index.offset_to_position(offset).unwrap(), pos);
                }
            }
        }
    }
}
