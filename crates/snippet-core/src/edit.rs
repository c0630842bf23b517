//! Edit scripts.
//!
//! An [`EditScript`] is an ordered list of [`EditOp`]s describing how one snapshot of a line
//! range turned into another. Positions are absolute buffer positions in characters.
//!
//! Semantics:
//! - Each op's position is valid **at the time the op is applied**, i.e. after every earlier op
//!   of the same script has been applied.
//! - `Delete`/`Replace` carry the exact removed text so replay can be verified.

use crate::error::ReplayError;
use crate::geometry::{Position, char_len, char_prefix, char_suffix_from};

/// A single edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Insert `text` at `at`.
    Insert {
        /// Insertion point.
        at: Position,
        /// Inserted text (may contain newlines).
        text: String,
    },
    /// Delete `text`, which starts at `at`.
    Delete {
        /// Start of the deleted range.
        at: Position,
        /// Deleted text (may contain newlines).
        text: String,
    },
    /// Replace `old`, which starts at `at`, with `new`.
    Replace {
        /// Start of the replaced range.
        at: Position,
        /// Removed text.
        old: String,
        /// Inserted text.
        new: String,
    },
}

/// A newline-free piece of an edit, or a single `"\n"`.
///
/// The tabstop tree replays atoms one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAtom {
    /// Insert `text` at `at`.
    Insert {
        /// Insertion point.
        at: Position,
        /// Newline-free text or exactly `"\n"`.
        text: String,
    },
    /// Delete `text` starting at `at`.
    Delete {
        /// Start of the deleted range.
        at: Position,
        /// Newline-free text or exactly `"\n"`.
        text: String,
    },
}

impl EditAtom {
    /// Where the atom applies.
    pub fn at(&self) -> Position {
        match self {
            Self::Insert { at, .. } | Self::Delete { at, .. } => *at,
        }
    }

    /// The inserted or deleted text.
    pub fn text(&self) -> &str {
        match self {
            Self::Insert { text, .. } | Self::Delete { text, .. } => text,
        }
    }

    /// End of the affected range in the text *before* the atom is applied.
    pub fn old_end(&self) -> Position {
        match self {
            Self::Insert { at, .. } => *at,
            Self::Delete { at, text } => at.advanced_by(text),
        }
    }

    /// End of the affected range in the text *after* the atom is applied.
    pub fn new_end(&self) -> Position {
        match self {
            Self::Insert { at, text } => at.advanced_by(text),
            Self::Delete { at, .. } => *at,
        }
    }

    /// Apply the atom to `lines`, whose first element is buffer line `first_line`.
    ///
    /// An empty `lines` is treated as one empty line. Deletions must remove exactly the text
    /// the atom carries.
    pub fn apply_to(&self, lines: &mut Vec<String>, first_line: usize) -> Result<(), ReplayError> {
        if lines.is_empty() {
            lines.push(String::new());
        }
        let at = self.at();
        let out_of_range = ReplayError::OutOfRange(at);
        let row = at.line.checked_sub(first_line).ok_or(out_of_range.clone())?;
        let line = lines.get(row).ok_or(out_of_range.clone())?;
        let line_len = char_len(line);
        if at.column > line_len {
            return Err(out_of_range);
        }

        match self {
            Self::Insert { text, .. } if text == "\n" => {
                let head = char_prefix(line, at.column).to_string();
                let tail = char_suffix_from(line, at.column).to_string();
                lines[row] = head;
                lines.insert(row + 1, tail);
            }
            Self::Insert { text, .. } => {
                let mut updated = char_prefix(line, at.column).to_string();
                updated.push_str(text);
                updated.push_str(char_suffix_from(line, at.column));
                lines[row] = updated;
            }
            Self::Delete { text, .. } if text == "\n" => {
                if at.column != line_len {
                    return Err(ReplayError::Mismatch(at));
                }
                if row + 1 >= lines.len() {
                    return Err(out_of_range);
                }
                let next = lines.remove(row + 1);
                lines[row].push_str(&next);
            }
            Self::Delete { text, .. } => {
                let len = char_len(text);
                let rest = char_suffix_from(line, at.column);
                if char_len(rest) < len || char_prefix(rest, len) != text {
                    return Err(ReplayError::Mismatch(at));
                }
                let mut updated = char_prefix(line, at.column).to_string();
                updated.push_str(char_suffix_from(rest, len));
                lines[row] = updated;
            }
        }
        Ok(())
    }
}

/// Split `text` into newline-free runs and single newlines, in order.
fn pieces(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find('\n') {
        if idx > 0 {
            out.push(&rest[..idx]);
        }
        out.push("\n");
        rest = &rest[idx + 1..];
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

fn push_inserts(out: &mut Vec<EditAtom>, at: Position, text: &str) {
    let mut pos = at;
    for piece in pieces(text) {
        out.push(EditAtom::Insert {
            at: pos,
            text: piece.to_string(),
        });
        pos = pos.advanced_by(piece);
    }
}

fn push_deletes(out: &mut Vec<EditAtom>, at: Position, text: &str) {
    // Every piece starts where the previous one was removed.
    for piece in pieces(text) {
        out.push(EditAtom::Delete {
            at,
            text: piece.to_string(),
        });
    }
}

/// An ordered list of edit operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditScript {
    /// The operations, applied in order.
    pub ops: Vec<EditOp>,
}

impl EditScript {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// A script of the given ops.
    pub fn from_ops(ops: Vec<EditOp>) -> Self {
        Self { ops }
    }

    /// Returns `true` if the script changes nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Append an operation.
    pub fn push(&mut self, op: EditOp) {
        self.ops.push(op);
    }

    /// Break the script into newline-free atoms, preserving sequential semantics.
    ///
    /// A `Replace` becomes its deletions followed by its insertions.
    pub fn atoms(&self) -> Vec<EditAtom> {
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                EditOp::Insert { at, text } => push_inserts(&mut out, *at, text),
                EditOp::Delete { at, text } => push_deletes(&mut out, *at, text),
                EditOp::Replace { at, old, new } => {
                    push_deletes(&mut out, *at, old);
                    push_inserts(&mut out, *at, new);
                }
            }
        }
        out
    }

    /// Apply the script to `lines`, whose first element is buffer line `first_line`.
    ///
    /// Returns `None` if an op points outside the lines or its deleted text does not match.
    pub fn apply_to_lines(&self, lines: &[String], first_line: usize) -> Option<Vec<String>> {
        let mut lines = lines.to_vec();
        for atom in self.atoms() {
            atom.apply_to(&mut lines, first_line).ok()?;
        }
        Some(lines)
    }

    /// Returns `true` if applying the script to `old` yields exactly `new`.
    pub fn transforms(&self, old: &[String], new: &[String], first_line: usize) -> bool {
        self.apply_to_lines(old, first_line)
            .is_some_and(|result| result.join("\n") == new.join("\n"))
    }
}
