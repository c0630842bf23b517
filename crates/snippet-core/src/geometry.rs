//! Buffer geometry: logical positions and spans.
//!
//! All columns are **character** offsets (Unicode scalar values) within a logical line.
//! Converting from byte columns is the host adapter's job.

use std::cmp::Ordering;
use std::fmt;

/// Position coordinates (line and column numbers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Zero-based logical line index.
    pub line: usize,
    /// Zero-based column in characters within the logical line.
    pub column: usize,
}

impl Position {
    /// Create a new logical position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position reached after writing `text` starting at `self`.
    pub fn advanced_by(self, text: &str) -> Self {
        let mut line = self.line;
        let mut column = self.column;
        for ch in text.chars() {
            if ch == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A region of the buffer between two positions (`start <= end`).
///
/// Containment is non-strict on both ends: a caret sitting right after the last
/// character of a tabstop is still "inside" it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// First position covered by the span.
    pub start: Position,
    /// Position right after the last covered character.
    pub end: Position,
}

impl Span {
    /// Create a span, swapping the ends if they are given in reverse.
    pub fn new(start: Position, end: Position) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A zero-width span at `pos`.
    pub fn empty_at(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Returns `true` if the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Non-strict point containment.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Non-strict span containment.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Characters `start..end` of `text`, clamped to the text like a slice that never panics.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |idx: usize| {
        text.char_indices()
            .nth(idx)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    let start_byte = byte_at(start);
    let end_byte = if end <= start {
        start_byte
    } else {
        byte_at(end)
    };
    &text[start_byte..end_byte]
}

/// The first `count` characters of `text`.
pub fn char_prefix(text: &str, count: usize) -> &str {
    char_slice(text, 0, count)
}

/// Everything after the first `count` characters of `text`.
pub fn char_suffix_from(text: &str, count: usize) -> &str {
    char_slice(text, count, usize::MAX)
}
