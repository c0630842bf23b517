//! Cursor-history edit guesser.
//!
//! Most changes between two cursor events are a single keystroke. Given where the cursor was
//! and where it is now, the guesser names that edit directly instead of diffing.
//!
//! Every hypothesis is checked by replaying it onto the old lines; only an exact reproduction of
//! the new lines is accepted.

use crate::edit::{EditOp, EditScript};
use crate::geometry::{Position, char_len, char_slice};
use crate::tracker::CursorSnapshot;

/// Try to explain `old -> new` as one common edit.
///
/// `old` and `new` are the windowed lines starting at buffer line `first_line`; `previous` and
/// `current` are the last two cursor snapshots.
pub fn guess_edit(
    first_line: usize,
    old: &[String],
    new: &[String],
    previous: &CursorSnapshot,
    current: &CursorSnapshot,
) -> Option<EditScript> {
    if old.is_empty() && new.is_empty() {
        return Some(EditScript::new());
    }

    let guesser = Guesser {
        first_line,
        old,
        new,
        ppos: previous.position,
        pos: current.position,
    };

    guesser
        .everything_deleted()
        .or_else(|| {
            previous
                .selection
                .and_then(|sel| guesser.selection_replaced(sel.start, sel.end))
        })
        .or_else(|| guesser.same_line_edit())
        .or_else(|| guesser.newline())
}

struct Guesser<'a> {
    first_line: usize,
    old: &'a [String],
    new: &'a [String],
    ppos: Position,
    pos: Position,
}

impl Guesser<'_> {
    fn verified(&self, ops: Vec<EditOp>) -> Option<EditScript> {
        let script = EditScript::from_ops(ops);
        script
            .transforms(self.old, self.new, self.first_line)
            .then_some(script)
    }

    fn old_line(&self, line: usize) -> Option<&str> {
        let row = line.checked_sub(self.first_line)?;
        self.old.get(row).map(String::as_str)
    }

    fn new_line(&self, line: usize) -> Option<&str> {
        let row = line.checked_sub(self.first_line)?;
        self.new.get(row).map(String::as_str)
    }

    fn everything_deleted(&self) -> Option<EditScript> {
        let cleared = self.new.is_empty() || (self.new.len() == 1 && self.new[0].is_empty());
        if self.old.is_empty() || !cleared {
            return None;
        }
        self.verified(vec![EditOp::Delete {
            at: Position::new(self.first_line, 0),
            text: self.old.join("\n"),
        }])
    }

    /// A single-line selection was overtyped: delete it, then insert what is before the cursor.
    fn selection_replaced(&self, start: Position, end: Position) -> Option<EditScript> {
        if start.line != end.line {
            return None;
        }
        let old_line = self.old_line(start.line)?;
        let mut ops = vec![EditOp::Delete {
            at: start,
            text: char_slice(old_line, start.column, end.column).to_string(),
        }];
        if start != self.pos && start.line == self.pos.line {
            let new_line = self.new_line(start.line)?;
            ops.push(EditOp::Insert {
                at: start,
                text: char_slice(new_line, start.column, self.pos.column).to_string(),
            });
        }
        self.verified(ops)
    }

    fn same_line_edit(&self) -> Option<EditScript> {
        if self.pos.line != self.ppos.line {
            return None;
        }

        if self.old.len() == self.new.len() {
            let old_line = self.old_line(self.ppos.line)?;
            let new_line = self.new_line(self.pos.line)?;
            let llen = char_len(old_line);
            let clen = char_len(new_line);

            if self.ppos < self.pos && clen > llen {
                // Typed characters.
                let typed = self.verified(vec![EditOp::Insert {
                    at: self.ppos,
                    text: char_slice(new_line, self.ppos.column, self.pos.column).to_string(),
                }]);
                if typed.is_some() {
                    return typed;
                }
            }

            if clen < llen {
                let removed = llen - clen;
                // `x` / DEL keep the cursor; backspace moves it left.
                if self.ppos == self.pos || self.pos < self.ppos {
                    return self.verified(vec![EditOp::Delete {
                        at: self.pos,
                        text: char_slice(old_line, self.pos.column, self.pos.column + removed)
                            .to_string(),
                    }]);
                }
            }
            return None;
        }

        if self.new.len() < self.old.len() {
            // Whole lines removed (`dd`).
            let first = self.pos.line.checked_sub(self.first_line)?;
            let count = self.old.len() - self.new.len();
            let mut text = String::new();
            for line in self.old.get(first..first + count)? {
                text.push_str(line);
                text.push('\n');
            }
            return self.verified(vec![EditOp::Delete {
                at: Position::new(self.pos.line, 0),
                text,
            }]);
        }

        None
    }

    fn newline(&self) -> Option<EditScript> {
        if self.ppos.line + 1 == self.pos.line && self.pos.column == 0 {
            return self.verified(vec![EditOp::Insert {
                at: self.ppos,
                text: "\n".to_string(),
            }]);
        }
        None
    }
}
