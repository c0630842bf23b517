//! Host buffer access.
//!
//! The engine never owns the text it edits. Hosts implement [`TextBuffer`] over their own
//! storage; [`RopeBuffer`] is a self-contained implementation backed by a [`ropey::Rope`].
//!
//! All columns are character offsets.

use ropey::Rope;

use crate::error::SnippetError;
use crate::geometry::{Position, Span, char_len, char_prefix, char_slice, char_suffix_from};
use crate::indent::IndentStyle;

/// The buffer operations the engine needs.
pub trait TextBuffer {
    /// Identifier used to key per-buffer state (filetypes).
    fn id(&self) -> usize;

    /// Number of logical lines.
    fn line_count(&self) -> usize;

    /// Line `index` without its line terminator.
    fn line(&self, index: usize) -> Option<String>;

    /// Replace the text in `span` with `text`. Does not move the cursor.
    fn replace(&mut self, span: Span, text: &str) -> Result<(), SnippetError>;

    /// Current cursor position.
    fn cursor(&self) -> Position;

    /// Move the cursor.
    fn set_cursor(&mut self, pos: Position);

    /// Active selection, if any.
    fn selection(&self) -> Option<Span>;

    /// Select `span` (an empty span just places the cursor), leaving the cursor at its end.
    fn select(&mut self, span: Span);

    /// Indentation style for re-indenting snippet bodies.
    fn indent_style(&self) -> IndentStyle {
        IndentStyle::default()
    }

    /// Lines `start..end`, clipped to the buffer.
    fn lines(&self, start: usize, end: usize) -> Vec<String> {
        let end = end.min(self.line_count());
        (start..end).filter_map(|idx| self.line(idx)).collect()
    }

    /// The text covered by `span`, joined with `\n`.
    fn text_in(&self, span: Span) -> String {
        let lines = self.lines(span.start.line, span.end.line + 1);
        let mut out = String::new();
        for (offset, line) in lines.iter().enumerate() {
            let row = span.start.line + offset;
            let from = if row == span.start.line {
                span.start.column
            } else {
                0
            };
            if row == span.end.line {
                let to = span.end.column.max(from);
                out.push_str(char_slice(line, from, to));
            } else {
                out.push_str(char_suffix_from(line, from));
                out.push('\n');
            }
        }
        out
    }

    /// The cursor line split at the cursor into `(before, after)`.
    fn current_line_split(&self) -> (String, String) {
        let cursor = self.cursor();
        let line = self.line(cursor.line).unwrap_or_default();
        (
            char_prefix(&line, cursor.column).to_string(),
            char_suffix_from(&line, cursor.column).to_string(),
        )
    }
}

/// Single-character line breaks recognised by ropey; `\r\n` is handled separately.
const LINE_BREAKS: [char; 7] = [
    '\n', '\u{000B}', '\u{000C}', '\r', '\u{0085}', '\u{2028}', '\u{2029}',
];

/// A [`TextBuffer`] backed by a rope.
#[derive(Debug, Clone)]
pub struct RopeBuffer {
    id: usize,
    rope: Rope,
    cursor: Position,
    selection: Option<Span>,
    indent_style: IndentStyle,
}

impl RopeBuffer {
    /// Create a buffer holding `text`, cursor at the origin.
    pub fn new(text: &str) -> Self {
        Self {
            id: 0,
            rope: Rope::from_str(text),
            cursor: Position::default(),
            selection: None,
            indent_style: IndentStyle::default(),
        }
    }

    /// Set the buffer id.
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Set the indentation style.
    pub fn with_indent_style(mut self, style: IndentStyle) -> Self {
        self.indent_style = style;
        self
    }

    /// The whole text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Clear the selection without moving the cursor.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Type `text` at the cursor (replacing the selection, if any) and move the cursor after it.
    pub fn type_text(&mut self, text: &str) -> Result<(), SnippetError> {
        let span = self
            .selection
            .take()
            .unwrap_or_else(|| Span::empty_at(self.cursor));
        self.replace(span, text)?;
        self.cursor = span.start.advanced_by(text);
        Ok(())
    }

    /// Delete the character before the cursor, joining lines at column 0.
    pub fn backspace(&mut self) -> Result<(), SnippetError> {
        let cursor = self.cursor;
        let start = if cursor.column > 0 {
            Position::new(cursor.line, cursor.column - 1)
        } else if cursor.line > 0 {
            let prev = self.line(cursor.line - 1).map(|l| char_len(&l)).unwrap_or(0);
            Position::new(cursor.line - 1, prev)
        } else {
            return Ok(());
        };
        self.selection = None;
        self.replace(Span::new(start, cursor), "")?;
        self.cursor = start;
        Ok(())
    }

    fn char_index(&self, pos: Position) -> Result<usize, SnippetError> {
        if pos.line >= self.rope.len_lines() {
            return Err(SnippetError::Buffer(format!("line {} out of range", pos.line)));
        }
        let line_len = char_len(&self.line_text(pos.line));
        if pos.column > line_len {
            return Err(SnippetError::Buffer(format!("column out of range at {pos}")));
        }
        Ok(self.rope.line_to_char(pos.line) + pos.column)
    }

    /// Line `index` without the terminator ropey broke it at.
    fn line_text(&self, index: usize) -> String {
        let mut line = self.rope.line(index).to_string();
        if line.ends_with("\r\n") {
            line.truncate(line.len() - 2);
        } else if line.ends_with(LINE_BREAKS) {
            line.pop();
        }
        line
    }
}

impl TextBuffer for RopeBuffer {
    fn id(&self) -> usize {
        self.id
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line(&self, index: usize) -> Option<String> {
        (index < self.rope.len_lines()).then(|| self.line_text(index))
    }

    fn replace(&mut self, span: Span, text: &str) -> Result<(), SnippetError> {
        let start = self.char_index(span.start)?;
        let end = self.char_index(span.end)?;
        self.rope.remove(start..end);
        self.rope.insert(start, text);
        Ok(())
    }

    fn cursor(&self) -> Position {
        self.cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = pos;
        self.selection = None;
    }

    fn selection(&self) -> Option<Span> {
        self.selection
    }

    fn select(&mut self, span: Span) {
        self.selection = (!span.is_empty()).then_some(span);
        self.cursor = span.end;
    }

    fn indent_style(&self) -> IndentStyle {
        self.indent_style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_count() {
        let buffer = RopeBuffer::new("one\ntwo\nthree");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.line(1).as_deref(), Some("two"));
        assert_eq!(buffer.line(3), None);
        assert_eq!(buffer.lines(1, 10), vec!["two", "three"]);
    }

    #[test]
    fn test_lines_drop_every_line_terminator() {
        let mut buffer = RopeBuffer::new("ab\r\ncd\r\nef\u{2028}gh");
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.lines(0, 4), vec!["ab", "cd", "ef", "gh"]);

        buffer
            .replace(Span::empty_at(Position::new(1, 2)), "x")
            .unwrap();
        assert_eq!(buffer.text(), "ab\r\ncdx\r\nef\u{2028}gh");
        assert_eq!(
            buffer.text_in(Span::new(Position::new(0, 1), Position::new(1, 3))),
            "b\ncdx"
        );
        assert!(buffer
            .replace(Span::empty_at(Position::new(0, 3)), "x")
            .is_err());
    }

    #[test]
    fn test_replace_multiline() {
        let mut buffer = RopeBuffer::new("héllo\nwörld");
        buffer
            .replace(
                Span::new(Position::new(0, 2), Position::new(1, 1)),
                "XY\nZ",
            )
            .unwrap();
        assert_eq!(buffer.text(), "héXY\nZörld");
        assert!(buffer
            .replace(Span::empty_at(Position::new(0, 99)), "x")
            .is_err());
    }

    #[test]
    fn test_text_in_and_line_split() {
        let mut buffer = RopeBuffer::new("abc\ndef\nghi");
        let span = Span::new(Position::new(0, 1), Position::new(2, 2));
        assert_eq!(buffer.text_in(span), "bc\ndef\ngh");

        buffer.set_cursor(Position::new(1, 1));
        assert_eq!(
            buffer.current_line_split(),
            ("d".to_string(), "ef".to_string())
        );
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut buffer = RopeBuffer::new("ab");
        buffer.set_cursor(Position::new(0, 1));
        buffer.type_text("X\nY").unwrap();
        assert_eq!(buffer.text(), "aX\nYb");
        assert_eq!(buffer.cursor(), Position::new(1, 1));

        buffer.backspace().unwrap();
        buffer.backspace().unwrap();
        assert_eq!(buffer.text(), "aXb");
        assert_eq!(buffer.cursor(), Position::new(0, 2));
    }

    #[test]
    fn test_select_replaces_on_type() {
        let mut buffer = RopeBuffer::new("name");
        buffer.select(Span::new(Position::new(0, 0), Position::new(0, 4)));
        assert_eq!(buffer.cursor(), Position::new(0, 4));
        buffer.type_text("x").unwrap();
        assert_eq!(buffer.text(), "x");
        assert_eq!(buffer.selection(), None);
    }
}
