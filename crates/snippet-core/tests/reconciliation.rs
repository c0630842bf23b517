use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snippet_core::{
    Position, ReconcileOutcome, RopeBuffer, SnapshotKind, SnippetDefinition, SnippetManager, Span,
    TextBuffer, diff,
};

fn buffer_at(text: &str, line: usize, column: usize) -> RopeBuffer {
    let mut buffer = RopeBuffer::new(text);
    buffer.set_cursor(Position::new(line, column));
    buffer
}

fn span(l1: usize, c1: usize, l2: usize, c2: usize) -> Span {
    Span::new(Position::new(l1, c1), Position::new(l2, c2))
}

fn expanded(trigger: &str, body: &str, text: &str) -> (SnippetManager, RopeBuffer) {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new(trigger, body, "", "").unwrap());
    let mut buffer = buffer_at(text, 0, text.chars().count());
    manager.expand(&mut buffer);
    (manager, buffer)
}

fn tabstop_span(manager: &SnippetManager, number: usize) -> Option<Span> {
    manager
        .snapshot()
        .into_iter()
        .find(|node| node.kind == SnapshotKind::Tabstop(number))
        .map(|node| node.span)
}

/// Every mirror reads the same as the buffer says its text should.
fn mirror_texts(manager: &SnippetManager, buffer: &RopeBuffer) -> Vec<String> {
    manager
        .snapshot()
        .into_iter()
        .filter(|node| matches!(node.kind, SnapshotKind::Mirror(_)))
        .map(|node| buffer.text_in(node.span))
        .collect()
}

#[test]
fn test_unchanged_buffer_is_a_no_op() {
    let (mut manager, mut buffer) = expanded("for", "for (${1:i} = 0; $1 < ${2:n}; $1++) {\n\t$0\n}", "for");
    let before = manager.snapshot();

    assert_eq!(manager.cursor_moved(&mut buffer), ReconcileOutcome::NoOp);
    assert_eq!(manager.cursor_moved(&mut buffer), ReconcileOutcome::NoOp);
    assert_eq!(manager.snapshot(), before);
}

#[test]
fn test_mirrors_follow_typing() {
    let (mut manager, mut buffer) = expanded("m", "${1:word} ${1/(.*)/\\U$1/} $1", "m");
    assert_eq!(buffer.text(), "word WORD word");

    buffer.type_text("abc").unwrap();
    manager.cursor_moved(&mut buffer);
    assert_eq!(buffer.text(), "abc ABC abc");
    assert_eq!(mirror_texts(&manager, &buffer), vec!["ABC", "abc"]);

    buffer.type_text("d").unwrap();
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );
    assert_eq!(buffer.text(), "abcd ABCD abcd");
    assert_eq!(mirror_texts(&manager, &buffer), vec!["ABCD", "abcd"]);
    assert_eq!(buffer.cursor(), Position::new(0, 4));
}

#[test]
fn test_mirror_on_following_line_keeps_cursor() {
    let (mut manager, mut buffer) = expanded("env", "\\begin{${1:env}}\n\t$0\n\\end{$1}", "env");
    assert_eq!(buffer.text(), "\\begin{env}\n\t\n\\end{env}");

    buffer.type_text("itemize").unwrap();
    manager.cursor_moved(&mut buffer);
    assert_eq!(buffer.text(), "\\begin{itemize}\n\t\n\\end{itemize}");
    assert_eq!(buffer.cursor(), Position::new(0, 14));
    assert_eq!(tabstop_span(&manager, 0), Some(span(1, 1, 1, 1)));
}

#[test]
fn test_backspace_inside_tabstop() {
    let (mut manager, mut buffer) = expanded("p", "print(${1:value})$0", "p");
    buffer.type_text("abc").unwrap();
    manager.cursor_moved(&mut buffer);

    buffer.backspace().unwrap();
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );
    assert_eq!(buffer.text(), "print(ab)");
    assert_eq!(tabstop_span(&manager, 1), Some(span(0, 6, 0, 8)));
    assert_eq!(tabstop_span(&manager, 0), Some(span(0, 9, 0, 9)));
}

#[test]
fn test_newline_and_join_inside_tabstop() {
    let (mut manager, mut buffer) = expanded("blk", "{\n\t${1:body}\n}", "blk");
    buffer.type_text("line").unwrap();
    manager.cursor_moved(&mut buffer);
    assert_eq!(buffer.text(), "{\n\tline\n}");

    buffer.type_text("\n").unwrap();
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );
    assert_eq!(tabstop_span(&manager, 1), Some(span(1, 1, 2, 0)));
    assert_eq!(tabstop_span(&manager, 0), Some(span(3, 1, 3, 1)));

    buffer.backspace().unwrap();
    assert_eq!(buffer.text(), "{\n\tline\n}");
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );
    assert_eq!(tabstop_span(&manager, 1), Some(span(1, 1, 1, 5)));
    assert_eq!(tabstop_span(&manager, 0), Some(span(2, 1, 2, 1)));
}

#[test]
fn test_edit_not_explained_by_cursor_falls_back_to_diff() {
    let (mut manager, mut buffer) = expanded("kv", "${1:key}: ${2:value}", "kv");
    // Host rewrote text away from the cursor (e.g. a substitute command).
    buffer
        .replace(span(0, 5, 0, 10), "other")
        .unwrap();
    assert!(matches!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { .. }
    ));
    assert_eq!(buffer.text(), "key: other");
    assert_eq!(tabstop_span(&manager, 2), Some(span(0, 5, 0, 10)));
}

#[test]
fn test_distant_edits_in_a_long_snippet_keep_every_tabstop() {
    let filler = "z".repeat(1200);
    let body = format!("X${{1:a}}\n{filler}\n${{2:b}}Y");
    let (mut manager, mut buffer) = expanded("big", &body, "big");
    assert_eq!(buffer.text(), format!("Xa\n{filler}\nbY"));
    let tabstops = |manager: &SnippetManager| -> Vec<SnapshotKind> {
        manager
            .snapshot()
            .into_iter()
            .map(|node| node.kind)
            .filter(|kind| matches!(kind, SnapshotKind::Tabstop(_)))
            .collect()
    };
    let before = tabstops(&manager);
    assert_eq!(
        before,
        vec![SnapshotKind::Tabstop(1), SnapshotKind::Tabstop(2), SnapshotKind::Tabstop(0)]
    );

    // A host command rewrites both ends of the snippet; the cursor stays in tabstop 1.
    buffer.replace(span(0, 0, 0, 1), "Q").unwrap();
    buffer.replace(span(2, 1, 2, 2), "W").unwrap();
    buffer.set_cursor(Position::new(0, 1));
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 2 }
    );
    assert_eq!(buffer.text(), format!("Qa\n{filler}\nbW"));
    assert_eq!(tabstops(&manager), before);
    assert_eq!(tabstop_span(&manager, 0), Some(span(2, 2, 2, 2)));
    assert_eq!(manager.active_depth(), 1);
}

#[test]
fn test_edit_before_the_snippet_moves_it() {
    let (mut manager, mut buffer) = expanded("t", "<${1:a}>", "x t");
    assert_eq!(buffer.text(), "x <a>");
    assert_eq!(tabstop_span(&manager, 1), Some(span(0, 3, 0, 4)));

    // A host-side insertion at the start of the line; the cursor follows it.
    buffer.replace(Span::empty_at(Position::new(0, 0)), "ab").unwrap();
    buffer.set_cursor(Position::new(0, 6));
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );
    assert_eq!(manager.active_depth(), 1);
    assert_eq!(tabstop_span(&manager, 1), Some(span(0, 5, 0, 6)));
    assert_eq!(tabstop_span(&manager, 0), Some(span(0, 7, 0, 7)));
}

#[test]
fn test_typing_outside_the_snippet_finishes_it() {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new("t", "<${1:a}>", "", "").unwrap());
    let mut buffer = buffer_at("head\nt", 1, 1);
    manager.expand(&mut buffer);
    assert_eq!(manager.active_depth(), 1);

    buffer.set_cursor(Position::new(0, 4));
    buffer.type_text("!").unwrap();
    assert_eq!(manager.cursor_moved(&mut buffer), ReconcileOutcome::NoOp);
    assert_eq!(manager.active_depth(), 0);
    assert_eq!(buffer.text(), "head!\n<a>");
}

#[test]
fn test_diff_round_trips_random_line_edits() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let vocabulary = ["", "fn main() {", "\tlet x = 1;", "}", "// note", "x += 2;", "é∂ƒ"];

    for _ in 0..200 {
        let old: Vec<String> = (0..rng.gen_range(0..8))
            .map(|_| vocabulary[rng.gen_range(0..vocabulary.len())].to_string())
            .collect();
        let mut new = old.clone();
        for _ in 0..rng.gen_range(1..4) {
            let line = vocabulary[rng.gen_range(0..vocabulary.len())].to_string();
            match rng.gen_range(0..3) {
                0 => {
                    let at = rng.gen_range(0..=new.len());
                    new.insert(at, line);
                }
                1 if !new.is_empty() => {
                    let at = rng.gen_range(0..new.len());
                    new.remove(at);
                }
                _ if !new.is_empty() => {
                    let at = rng.gen_range(0..new.len());
                    new[at] = line;
                }
                _ => new.push(line),
            }
        }

        let first_line = rng.gen_range(0..5);
        let script = diff(&old.join("\n"), &new.join("\n"), first_line);
        assert!(
            script.transforms(&old, &new, first_line),
            "old: {old:?}\nnew: {new:?}\nscript: {script:?}"
        );
    }
}
