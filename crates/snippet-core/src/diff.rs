//! Fallback structural diff.
//!
//! Used when the guesser cannot explain a change. Common suffix and prefix are trimmed first,
//! the rest is diffed line by line with the histogram algorithm, and every changed line hunk
//! is refined character by character with Myers. The result is deterministic but not
//! necessarily minimal.

use imara_diff::{Algorithm, Diff, Hunk, InternedInput};
use tracing::trace;

use crate::edit::{EditOp, EditScript};
use crate::geometry::Position;

/// Compute an edit script turning `old` into `new`.
///
/// Both texts are `\n`-joined lines whose first line is buffer line `first_line`.
pub fn diff(old: &str, new: &str, first_line: usize) -> EditScript {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();

    // Suffix first so that the prefix wins ties and insertions land as early as possible.
    let max_common = a.len().min(b.len());
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(max_common)
        .take_while(|(x, y)| x == y)
        .count();
    let prefix = a
        .iter()
        .zip(b.iter())
        .take(max_common - suffix)
        .take_while(|(x, y)| x == y)
        .count();

    let old_mid: String = a[prefix..a.len() - suffix].iter().collect();
    let new_mid: String = b[prefix..b.len() - suffix].iter().collect();
    if old_mid.is_empty() && new_mid.is_empty() {
        return EditScript::new();
    }

    let mut start = Position::new(first_line, 0);
    for ch in &a[..prefix] {
        start = advance(start, *ch);
    }

    let mut builder = ScriptBuilder::new(start);
    builder.diff_lines(&old_mid, &new_mid);
    trace!(ops = builder.script.len(), "diff computed");
    builder.script
}

fn advance(pos: Position, ch: char) -> Position {
    if ch == '\n' {
        Position::new(pos.line + 1, 0)
    } else {
        Position::new(pos.line, pos.column + 1)
    }
}

fn run_to_op(at: Position, deleted: &[char], inserted: &[char]) -> Option<EditOp> {
    match (deleted.is_empty(), inserted.is_empty()) {
        (true, true) => None,
        (true, false) => Some(EditOp::Insert {
            at,
            text: inserted.iter().collect(),
        }),
        (false, true) => Some(EditOp::Delete {
            at,
            text: deleted.iter().collect(),
        }),
        (false, false) => Some(EditOp::Replace {
            at,
            old: deleted.iter().collect(),
            new: inserted.iter().collect(),
        }),
    }
}

/// Turns hunks into ops, tracking where the next op applies in the partly edited text.
struct ScriptBuilder {
    script: EditScript,
    pos: Position,
    chars: InternedInput<char>,
    char_diff: Diff,
}

impl ScriptBuilder {
    fn new(start: Position) -> Self {
        Self {
            script: EditScript::new(),
            pos: start,
            chars: InternedInput::default(),
            char_diff: Diff::default(),
        }
    }

    fn retain(&mut self, kept: &[char]) {
        for ch in kept {
            self.pos = advance(self.pos, *ch);
        }
    }

    fn emit(&mut self, deleted: &[char], inserted: &[char]) {
        if let Some(op) = run_to_op(self.pos, deleted, inserted) {
            self.script.push(op);
            self.retain(inserted);
        }
    }

    fn diff_lines(&mut self, old: &str, new: &str) {
        let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
        let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

        let mut lines: InternedInput<&str> = InternedInput::default();
        lines.update_before(old_lines.iter().copied());
        lines.update_after(new_lines.iter().copied());
        let mut line_diff = Diff::default();
        line_diff.compute_with(
            Algorithm::Histogram,
            &lines.before,
            &lines.after,
            lines.interner.num_tokens(),
        );
        let hunks: Vec<Hunk> = line_diff.hunks().collect();

        let mut consumed = 0;
        for Hunk { before, after } in hunks {
            let (before, after) = (
                before.start as usize..before.end as usize,
                after.start as usize..after.end as usize,
            );
            let kept: Vec<char> = old_lines[consumed..before.start]
                .iter()
                .flat_map(|line| line.chars())
                .collect();
            self.retain(&kept);
            consumed = before.end;

            let deleted: Vec<char> = old_lines[before].iter().flat_map(|l| l.chars()).collect();
            let inserted: Vec<char> = new_lines[after].iter().flat_map(|l| l.chars()).collect();
            if deleted.is_empty() || inserted.is_empty() {
                self.emit(&deleted, &inserted);
            } else {
                self.refine(&deleted, &inserted);
            }
        }
    }

    /// Character-level diff of one changed line hunk.
    fn refine(&mut self, deleted: &[char], inserted: &[char]) {
        self.chars.update_before(deleted.iter().copied());
        self.chars.update_after(inserted.iter().copied());
        // Histogram does poorly on characters, which repeat a lot.
        self.char_diff.compute_with(
            Algorithm::Myers,
            &self.chars.before,
            &self.chars.after,
            self.chars.interner.num_tokens(),
        );
        let hunks: Vec<Hunk> = self.char_diff.hunks().collect();
        self.chars.clear();

        let mut consumed = 0;
        for Hunk { before, after } in hunks {
            let (before, after) = (
                before.start as usize..before.end as usize,
                after.start as usize..after.end as usize,
            );
            self.retain(&deleted[consumed..before.start]);
            consumed = before.end;
            self.emit(&deleted[before], &inserted[after]);
        }
    }
}
