//! Edit-tracking state: recent cursor positions, the remembered snippet text, and the preserved
//! visual selection.

use std::collections::VecDeque;

use crate::buffer::TextBuffer;
use crate::geometry::{Position, Span, char_slice};

/// Cursor position plus the selection that was active with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorSnapshot {
    /// Cursor position.
    pub position: Position,
    /// Active selection, if any.
    pub selection: Option<Span>,
}

impl CursorSnapshot {
    /// A snapshot with no selection.
    pub fn at(position: Position) -> Self {
        Self {
            position,
            selection: None,
        }
    }

    /// Capture the cursor and selection of `buffer`.
    pub fn of(buffer: &dyn TextBuffer) -> Self {
        Self {
            position: buffer.cursor(),
            selection: buffer.selection(),
        }
    }
}

/// Cursor history and the last remembered text of the active snippet region.
#[derive(Debug, Clone)]
pub struct EditTracker {
    history: VecDeque<CursorSnapshot>,
    capacity: usize,
    remembered: Vec<String>,
    remembered_line_count: usize,
}

impl EditTracker {
    /// Create a tracker keeping the last `capacity` cursor snapshots (at least two).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            remembered: Vec::new(),
            remembered_line_count: 0,
        }
    }

    /// Record a cursor snapshot, dropping the oldest one when full.
    pub fn remember_position(&mut self, snapshot: CursorSnapshot) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
    }

    /// Remember the lines `span.start.line ..= span.end.line` of `buffer`.
    pub fn remember_buffer(&mut self, buffer: &dyn TextBuffer, span: Span) {
        self.remembered = buffer.lines(span.start.line, span.end.line + 1);
        self.remembered_line_count = buffer.line_count();
    }

    /// The remembered lines.
    pub fn remembered_lines(&self) -> &[String] {
        &self.remembered
    }

    /// How many lines the buffer gained (or lost) since the last [`Self::remember_buffer`].
    pub fn diff_in_buffer_length(&self, line_count: usize) -> isize {
        line_count as isize - self.remembered_line_count as isize
    }

    /// The most recent snapshot.
    pub fn pos(&self) -> CursorSnapshot {
        self.history.back().copied().unwrap_or_default()
    }

    /// The snapshot before the most recent one (the most recent one if there is only one).
    pub fn ppos(&self) -> CursorSnapshot {
        let len = self.history.len();
        if len >= 2 {
            self.history[len - 2]
        } else {
            self.pos()
        }
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.history.clear();
        self.remembered.clear();
        self.remembered_line_count = 0;
    }
}

impl Default for EditTracker {
    fn default() -> Self {
        Self::new(5)
    }
}

/// How a visual selection was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualMode {
    /// Character-wise (`v`).
    #[default]
    Characterwise,
    /// Whole lines (`V`).
    Linewise,
    /// Rectangular block.
    Blockwise,
}

/// The last visual selection, kept for the next `${VISUAL}` expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualContent {
    text: String,
    mode: VisualMode,
}

impl VisualContent {
    /// Capture the current selection of `buffer`. Returns `false` when nothing is selected.
    pub fn conserve(&mut self, buffer: &dyn TextBuffer, mode: VisualMode) -> bool {
        let Some(selection) = buffer.selection() else {
            return false;
        };

        self.text = match mode {
            VisualMode::Characterwise => buffer.text_in(selection),
            VisualMode::Linewise => {
                let mut text = String::new();
                for line in buffer.lines(selection.start.line, selection.end.line + 1) {
                    text.push_str(&line);
                    text.push('\n');
                }
                text
            }
            VisualMode::Blockwise => {
                let (left, right) = if selection.start.column <= selection.end.column {
                    (selection.start.column, selection.end.column)
                } else {
                    (selection.end.column, selection.start.column)
                };
                buffer
                    .lines(selection.start.line, selection.end.line + 1)
                    .iter()
                    .map(|line| char_slice(line, left, right).to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        self.mode = mode;
        true
    }

    /// Set the content directly.
    pub fn set(&mut self, text: impl Into<String>, mode: VisualMode) {
        self.text = text.into();
        self.mode = mode;
    }

    /// The text `${VISUAL}` expands to, if any. Linewise content loses its final newline.
    pub fn text_for_expansion(&self) -> Option<&str> {
        if self.text.is_empty() {
            return None;
        }
        match self.mode {
            VisualMode::Linewise => Some(self.text.strip_suffix('\n').unwrap_or(&self.text)),
            _ => Some(&self.text),
        }
    }

    /// The selection mode the content was captured with.
    pub fn mode(&self) -> VisualMode {
        self.mode
    }

    /// Drop the content.
    pub fn reset(&mut self) {
        self.text.clear();
        self.mode = VisualMode::default();
    }
}
