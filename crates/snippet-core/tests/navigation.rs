use pretty_assertions::assert_eq;
use snippet_core::{
    Outcome, Position, ReconcileOutcome, RopeBuffer, SnapshotKind, SnippetDefinition,
    SnippetManager, Span, TextBuffer,
};

fn buffer_at(text: &str, line: usize, column: usize) -> RopeBuffer {
    let mut buffer = RopeBuffer::new(text);
    buffer.set_cursor(Position::new(line, column));
    buffer
}

fn span(l1: usize, c1: usize, l2: usize, c2: usize) -> Span {
    Span::new(Position::new(l1, c1), Position::new(l2, c2))
}

fn manager_with(trigger: &str, body: &str, options: &str) -> SnippetManager {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new(trigger, body, "", options).unwrap());
    manager
}

#[test]
fn test_jumps_visit_numbers_in_ascending_order() {
    let mut manager = manager_with("j", "$3 ${1:a} $2 ${4:d}", "");
    let mut buffer = buffer_at("j", 0, 1);
    assert_eq!(manager.expand(&mut buffer), Outcome::Expanded);

    let mut visited = vec![manager.current_tabstop()];
    while manager.active_depth() > 0 {
        assert_eq!(manager.jump_forwards(&mut buffer), Outcome::Jumped);
        visited.push(manager.current_tabstop());
    }
    assert_eq!(visited, vec![Some(1), Some(2), Some(3), Some(4), None]);
    assert_eq!(buffer.text(), " a  d");
    assert_eq!(buffer.cursor(), Position::new(0, 5));
}

#[test]
fn test_jump_backwards() {
    let mut manager = manager_with("j", "${1:a} ${2:b} ${3:c}", "");
    let mut buffer = buffer_at("j", 0, 1);
    manager.expand(&mut buffer);

    assert_eq!(manager.jump_backwards(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.current_tabstop(), Some(1));

    manager.jump_forwards(&mut buffer);
    manager.jump_forwards(&mut buffer);
    assert_eq!(manager.current_tabstop(), Some(3));
    assert_eq!(buffer.selection(), Some(span(0, 4, 0, 5)));

    assert_eq!(manager.jump_backwards(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.current_tabstop(), Some(2));
    assert_eq!(buffer.selection(), Some(span(0, 2, 0, 3)));
}

#[test]
fn test_for_loop_scenario() {
    let mut manager = manager_with("for", "for (${1:i} = 0; $1 < ${2:n}; $1++) {\n\t$0\n}", "");
    let mut buffer = buffer_at("for", 0, 3);
    manager.expand(&mut buffer);

    buffer.type_text("j").unwrap();
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 2 }
    );
    assert_eq!(buffer.text(), "for (j = 0; j < n; j++) {\n\t\n}");

    assert_eq!(manager.jump_forwards(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.current_tabstop(), Some(2));
    assert_eq!(buffer.selection(), Some(span(0, 16, 0, 17)));

    assert_eq!(manager.jump_forwards(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.active_depth(), 0);
    assert_eq!(buffer.cursor(), Position::new(1, 1));
    assert!(manager.snapshot().is_empty());
}

#[test]
fn test_expand_or_jump() {
    let mut manager = manager_with("pair", "(${1:a}, ${2:b})", "");
    let mut buffer = buffer_at("pair", 0, 4);
    assert_eq!(manager.expand_or_jump(&mut buffer), Outcome::Expanded);
    assert_eq!(manager.expand_or_jump(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.current_tabstop(), Some(2));
    assert_eq!(manager.expand_or_jump(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.active_depth(), 0);
    assert_eq!(
        manager.expand_or_jump(&mut buffer),
        Outcome::Failed {
            fallback_key: "<tab>".into()
        }
    );
}

#[test]
fn test_nested_expansion_inside_a_tabstop() {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new("pa", "(${1:x}, ${2:y})", "", "").unwrap());
    manager.add_snippet(SnippetDefinition::new("br", "[${1:a}]", "", "w").unwrap());

    let mut buffer = buffer_at("pa", 0, 2);
    manager.expand(&mut buffer);
    buffer.type_text("br").unwrap();
    manager.cursor_moved(&mut buffer);
    assert_eq!(buffer.text(), "(br, y)");

    assert_eq!(manager.expand(&mut buffer), Outcome::Expanded);
    assert_eq!(buffer.text(), "([a], y)");
    assert_eq!(manager.active_depth(), 2);
    assert_eq!(buffer.selection(), Some(span(0, 2, 0, 3)));

    let shape: Vec<(SnapshotKind, usize)> = manager
        .snapshot()
        .into_iter()
        .map(|node| (node.kind, node.depth))
        .collect();
    assert_eq!(
        shape,
        vec![
            (SnapshotKind::Snippet("pa".into()), 0),
            (SnapshotKind::Tabstop(1), 1),
            (SnapshotKind::Snippet("br".into()), 2),
            (SnapshotKind::Tabstop(1), 3),
            (SnapshotKind::Tabstop(0), 3),
            (SnapshotKind::Tabstop(2), 1),
            (SnapshotKind::Tabstop(0), 1),
        ]
    );

    buffer.type_text("q").unwrap();
    manager.cursor_moved(&mut buffer);
    assert_eq!(buffer.text(), "([q], y)");

    // Leaving the inner snippet through its $0 returns to the outer one.
    manager.jump_forwards(&mut buffer);
    assert_eq!(manager.active_depth(), 1);
    manager.jump_forwards(&mut buffer);
    assert_eq!(manager.current_tabstop(), Some(2));
    assert_eq!(buffer.selection(), Some(span(0, 6, 0, 7)));

    manager.jump_forwards(&mut buffer);
    assert_eq!(manager.active_depth(), 0);
    assert_eq!(buffer.cursor(), Position::new(0, 8));
}

#[test]
fn test_expanding_outside_active_snippet_replaces_it() {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new("a", "<${1:x}>", "", "").unwrap());

    let mut buffer = buffer_at("a\na", 0, 1);
    manager.expand(&mut buffer);
    assert_eq!(manager.active_depth(), 1);

    buffer.set_cursor(Position::new(1, 1));
    assert_eq!(manager.expand(&mut buffer), Outcome::Expanded);
    assert_eq!(buffer.text(), "<x>\n<x>");
    assert_eq!(manager.active_depth(), 1);
    assert_eq!(manager.snapshot()[0].span, span(1, 0, 1, 3));
}

#[test]
fn test_cursor_leaving_the_snippet_finishes_it() {
    let mut manager = manager_with("hi", "hello ${1:world}", "");
    let mut buffer = buffer_at("ab hi", 0, 5);
    manager.expand(&mut buffer);
    assert_eq!(buffer.text(), "ab hello world");
    assert_eq!(manager.active_depth(), 1);

    buffer.set_cursor(Position::new(0, 1));
    assert_eq!(manager.cursor_moved(&mut buffer), ReconcileOutcome::NoOp);
    assert_eq!(manager.active_depth(), 0);
    assert!(!manager.jump_forwards(&mut buffer).succeeded());
}

#[test]
fn test_leaving_buffer_finishes_everything() {
    let mut manager = SnippetManager::default();
    manager.add_snippet(SnippetDefinition::new("pa", "(${1:x}, ${2:y})", "", "").unwrap());
    manager.add_snippet(SnippetDefinition::new("x", "[${1:a}]", "", "w").unwrap());

    let mut buffer = buffer_at("pa", 0, 2);
    manager.expand(&mut buffer);
    manager.expand(&mut buffer);
    assert_eq!(manager.active_depth(), 2);

    manager.leaving_buffer();
    assert_eq!(manager.active_depth(), 0);
    assert!(manager.snapshot().is_empty());
    assert_eq!(
        manager.jump_forwards(&mut buffer),
        Outcome::Failed {
            fallback_key: "<c-j>".into()
        }
    );
}

#[test]
fn test_killed_tabstop_is_skipped() {
    let mut manager = manager_with("t", "a ${1:bc} d ${2:e}", "");
    let mut buffer = buffer_at("t", 0, 1);
    manager.expand(&mut buffer);
    assert_eq!(buffer.text(), "a bc d e");

    // Select " bc d" and delete it: tabstop 1 disappears.
    buffer.select(span(0, 1, 0, 6));
    manager.cursor_moved(&mut buffer);
    buffer.type_text("").unwrap();
    assert_eq!(buffer.text(), "a e");
    assert_eq!(
        manager.cursor_moved(&mut buffer),
        ReconcileOutcome::Replayed { operations: 1 }
    );

    let tabstops: Vec<SnapshotKind> = manager
        .snapshot()
        .into_iter()
        .map(|node| node.kind)
        .filter(|kind| matches!(kind, SnapshotKind::Tabstop(_)))
        .collect();
    assert_eq!(tabstops, vec![SnapshotKind::Tabstop(2), SnapshotKind::Tabstop(0)]);

    assert_eq!(manager.jump_forwards(&mut buffer), Outcome::Jumped);
    assert_eq!(manager.current_tabstop(), Some(2));
    assert_eq!(buffer.selection(), Some(span(0, 2, 0, 3)));
}
