//! The tabstop tree.
//!
//! Every active snippet instance, its tabstops, its mirrors, and any instances nested inside
//! them live in one arena addressed by [`NodeId`]. Parents are stored as ids, so moving a span
//! is a field update and no node owns another.
//!
//! Edits are replayed atom by atom (see [`EditScript::atoms`]). Each atom is routed down to the
//! innermost editable node it belongs to; that node and its ancestors grow or shrink at their
//! end, and every other position is moved like an interval offset:
//!
//! - positions before the edit stay put
//! - positions inside a removed range collapse onto the edit point
//! - positions after the edit shift by the edit's line/column delta

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::buffer::TextBuffer;
use crate::definition::SnippetDefinition;
use crate::edit::{EditAtom, EditScript};
use crate::error::{ReplayError, SnippetError};
use crate::geometry::{Position, Span, char_len, char_prefix, char_suffix_from};
use crate::template::{Rendered, RenderedKind};
use crate::transform::Transformation;

/// Stable index of a node in a [`SnippetTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Navigation state of one expanded snippet.
#[derive(Debug, Clone)]
pub struct SnippetInstance {
    definition: Arc<SnippetDefinition>,
    tabstops: BTreeMap<usize, NodeId>,
    current: Option<usize>,
    user_jumped: bool,
}

impl SnippetInstance {
    /// The definition this instance was expanded from.
    pub fn definition(&self) -> &Arc<SnippetDefinition> {
        &self.definition
    }

    /// Number of the selected tabstop; `None` once tabstop 0 has been reached.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Numbers of the live tabstops, ascending.
    pub fn tabstop_numbers(&self) -> Vec<usize> {
        self.tabstops.keys().copied().collect()
    }

    /// The node of tabstop `number`, if it is still alive.
    pub fn tabstop(&self, number: usize) -> Option<NodeId> {
        self.tabstops.get(&number).copied()
    }
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An expanded snippet.
    Snippet(SnippetInstance),
    /// Tabstop `number` of `instance`.
    Tabstop {
        /// Tabstop number.
        number: usize,
        /// Owning snippet node.
        instance: NodeId,
    },
    /// A mirror of tabstop `number` of `instance`.
    Mirror {
        /// Mirrored tabstop number.
        number: usize,
        /// Owning snippet node.
        instance: NodeId,
        /// Transformation applied to the tabstop text.
        transform: Option<Transformation>,
    },
}

impl NodeKind {
    /// Editable nodes accept user edits; mirrors do not.
    pub fn is_editable(&self) -> bool {
        !matches!(self, Self::Mirror { .. })
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    alive: bool,
}

/// Simplified view of a node, for hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotKind {
    /// A snippet instance with its trigger text.
    Snippet(String),
    /// A tabstop.
    Tabstop(usize),
    /// A mirror.
    Mirror(usize),
}

/// One entry of [`SnippetTree::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Node id.
    pub id: NodeId,
    /// Node kind.
    pub kind: SnapshotKind,
    /// Current span.
    pub span: Span,
    /// Depth below the root (the root is 0).
    pub depth: usize,
}

/// One text change in interval terms: `[start, old_end)` became `[start, new_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// Edit point.
    pub start: Position,
    /// End of the replaced range before the change.
    pub old_end: Position,
    /// End of the replacement after the change.
    pub new_end: Position,
}

impl Change {
    fn from_atom(atom: &EditAtom) -> Self {
        Self {
            start: atom.at(),
            old_end: atom.old_end(),
            new_end: atom.new_end(),
        }
    }

    fn is_insertion(&self) -> bool {
        self.start == self.old_end
    }

    /// Move a position at or after `old_end`.
    fn shift(&self, p: Position) -> Position {
        if p.line == self.old_end.line {
            Position::new(
                self.new_end.line,
                self.new_end.column + p.column.saturating_sub(self.old_end.column),
            )
        } else {
            Position::new(p.line - self.old_end.line + self.new_end.line, p.column)
        }
    }

    /// Move a node boundary that is not on the routed chain.
    ///
    /// `closes_earlier_node` is set for the end of a node starting before the edit point.
    fn map(&self, p: Position, closes_earlier_node: bool) -> Position {
        if p < self.start {
            p
        } else if p == self.start && (closes_earlier_node || !self.is_insertion()) {
            p
        } else if p < self.old_end {
            self.new_end
        } else {
            self.shift(p)
        }
    }

    /// Move the host cursor.
    pub fn map_cursor(&self, p: Position) -> Position {
        if p <= self.start {
            p
        } else if p < self.old_end {
            self.new_end
        } else {
            self.shift(p)
        }
    }
}

enum DeleteAction {
    Descend(NodeId),
    Kill(NodeId),
    Split(usize),
}

/// Arena holding every live snippet node.
#[derive(Debug, Clone, Default)]
pub struct SnippetTree {
    nodes: Vec<Node>,
}

impl SnippetTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Returns `true` if the tree holds no live node.
    pub fn is_empty(&self) -> bool {
        !self.nodes.iter().any(|n| n.alive)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).filter(|n| n.alive)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).filter(|n| n.alive)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Current span of a live node.
    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.node(id).map(|n| n.span)
    }

    /// Parent of a live node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Kind of a live node.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Instance state of a live snippet node.
    pub fn instance(&self, id: NodeId) -> Option<&SnippetInstance> {
        match self.kind(id) {
            Some(NodeKind::Snippet(instance)) => Some(instance),
            _ => None,
        }
    }

    fn instance_mut(&mut self, id: NodeId) -> Option<&mut SnippetInstance> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Snippet(instance)) => Some(instance),
            _ => None,
        }
    }

    /// The node of the selected tabstop of `instance`.
    pub fn current_tabstop_node(&self, instance: NodeId) -> Option<NodeId> {
        let instance = self.instance(instance)?;
        instance.tabstop(instance.current?)
    }

    /// Returns `true` (once per instance) the first time the user jumps in `instance`.
    pub fn take_first_jump(&mut self, instance: NodeId) -> bool {
        match self.instance_mut(instance) {
            Some(state) if !state.user_jumped => {
                state.user_jumped = true;
                true
            }
            _ => false,
        }
    }

    fn push_node(&mut self, kind: NodeKind, span: Span, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span,
            parent,
            children: Vec::new(),
            alive: true,
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, in_order: bool) {
        let Some(start) = self.span(child).map(|s| s.start) else {
            return;
        };
        let index = if in_order {
            None
        } else {
            self.node(parent).and_then(|p| {
                p.children
                    .iter()
                    .position(|c| self.span(*c).is_some_and(|s| s.start > start))
            })
        };
        if let Some(node) = self.node_mut(parent) {
            match index {
                Some(idx) => node.children.insert(idx, child),
                None => node.children.push(child),
            }
        }
    }

    /// Build the nodes for a freshly rendered snippet.
    ///
    /// The caller has already replaced `trigger` in the buffer with `rendered.text`. With a
    /// `parent`, the surrounding tree is first adjusted for that replacement.
    pub fn instantiate(
        &mut self,
        parent: Option<NodeId>,
        definition: Arc<SnippetDefinition>,
        rendered: &Rendered,
        trigger: Span,
    ) -> NodeId {
        if parent.is_some() {
            self.apply_change(
                Change {
                    start: trigger.start,
                    old_end: trigger.end,
                    new_end: rendered.span.end,
                },
                parent,
            );
        }

        let instance = SnippetInstance {
            definition,
            tabstops: BTreeMap::new(),
            current: Some(0),
            user_jumped: false,
        };
        let id = self.push_node(NodeKind::Snippet(instance), rendered.span, parent);
        if let Some(parent) = parent {
            self.attach(parent, id, false);
        }

        let mut ids: Vec<NodeId> = Vec::with_capacity(rendered.nodes.len());
        for rendered_node in &rendered.nodes {
            let owner = rendered_node
                .parent
                .and_then(|idx| ids.get(idx).copied())
                .unwrap_or(id);
            let kind = match &rendered_node.kind {
                RenderedKind::Tabstop(number) => NodeKind::Tabstop {
                    number: *number,
                    instance: id,
                },
                RenderedKind::Mirror(number, transform) => NodeKind::Mirror {
                    number: *number,
                    instance: id,
                    transform: transform.clone(),
                },
            };
            let node_id = self.push_node(kind, rendered_node.span, Some(owner));
            self.attach(owner, node_id, true);
            if let RenderedKind::Tabstop(number) = rendered_node.kind
                && let Some(state) = self.instance_mut(id)
            {
                state.tabstops.entry(number).or_insert(node_id);
            }
            ids.push(node_id);
        }

        id
    }

    /// The innermost editable node below `from` that a snippet expanded at `pos` should nest in.
    pub fn find_parent_for_new(&self, from: NodeId, pos: Position) -> NodeId {
        let mut node = from;
        'descend: loop {
            let Some(current) = self.node(node) else {
                return node;
            };
            for &child in &current.children {
                let Some(c) = self.node(child) else {
                    continue;
                };
                let s = c.span;
                let inside = (s.start <= pos && pos < s.end) || (s.start == pos && pos == s.end);
                if c.kind.is_editable() && inside {
                    node = child;
                    continue 'descend;
                }
            }
            return node;
        }
    }

    /// Select the next (or previous) tabstop of `instance` by number.
    ///
    /// Forward past the highest number selects tabstop 0 and marks the instance finished.
    /// Backward from the lowest number stays put. Returns `None` when there is nothing to select.
    pub fn select_next(&mut self, instance: NodeId, backwards: bool) -> Option<(usize, Span)> {
        let state = self.instance_mut(instance)?;
        let current = state.current?;

        let selected = if backwards {
            let previous = if current > 1 {
                state.tabstops.range(1..current).next_back().map(|(n, _)| *n)
            } else {
                None
            };
            match previous {
                Some(number) => {
                    state.current = Some(number);
                    number
                }
                None => current,
            }
        } else {
            match state.tabstops.range(current + 1..).next().map(|(n, _)| *n) {
                Some(number) => {
                    state.current = Some(number);
                    number
                }
                None => {
                    state.current = None;
                    0
                }
            }
        };

        let node = state.tabstops.get(&selected).copied()?;
        let span = self.span(node)?;
        trace!(tabstop = selected, %span, "selected tabstop");
        Some((selected, span))
    }

    /// Remove a node and everything below it.
    pub fn kill(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).map(|n| n.parent) else {
            return;
        };
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let Some(node) = self.node_mut(next) else {
                continue;
            };
            node.alive = false;
            pending.extend(node.children.drain(..));
            if let NodeKind::Tabstop { number, instance } = node.kind
                && let Some(state) = self.instance_mut(instance)
                && state.tabstops.get(&number) == Some(&next)
            {
                state.tabstops.remove(&number);
            }
        }
    }

    /// Replay `script` onto the tree below `root`.
    ///
    /// `focus` (normally the selected tabstop) wins ties when an insertion point touches more
    /// than one editable node. On error the tree is left as it was before the call.
    pub fn replay(
        &mut self,
        root: NodeId,
        script: &EditScript,
        focus: Option<NodeId>,
    ) -> Result<(), ReplayError> {
        self.transaction(|tree| {
            for atom in script.atoms() {
                tree.replay_atom(root, &atom, focus)?;
            }
            Ok(())
        })
    }

    /// Like [`replay`](Self::replay), but every atom is first checked against `remembered`,
    /// the text the script was computed from (first element is buffer line `first_line`).
    ///
    /// A deletion of text that is not there fails with [`ReplayError::Mismatch`].
    pub fn replay_against(
        &mut self,
        root: NodeId,
        script: &EditScript,
        focus: Option<NodeId>,
        remembered: &[String],
        first_line: usize,
    ) -> Result<(), ReplayError> {
        let mut lines = remembered.to_vec();
        self.transaction(|tree| {
            for atom in script.atoms() {
                atom.apply_to(&mut lines, first_line)?;
                tree.replay_atom(root, &atom, focus)?;
            }
            Ok(())
        })
    }

    fn transaction(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), ReplayError>,
    ) -> Result<(), ReplayError> {
        let saved = self.nodes.clone();
        let result = body(self);
        if result.is_err() {
            self.nodes = saved;
        }
        result
    }

    fn replay_atom(
        &mut self,
        root: NodeId,
        atom: &EditAtom,
        focus: Option<NodeId>,
    ) -> Result<(), ReplayError> {
        let root_span = self.span(root).ok_or(ReplayError::MissingNode(root.0))?;
        let change = Change::from_atom(atom);
        let inside = match atom {
            EditAtom::Insert { .. } => root_span.contains(change.start),
            EditAtom::Delete { .. } => {
                root_span.start <= change.start && change.old_end <= root_span.end
            }
        };
        if !inside {
            // Outside every snippet: only positions move.
            self.apply_change(change, None);
            return Ok(());
        }

        match atom {
            EditAtom::Insert { at, .. } => {
                let target = self.insertion_target(root, *at, focus);
                self.apply_change(change, Some(target));
                Ok(())
            }
            EditAtom::Delete { at, text } => self.replay_delete(root, *at, text),
        }
    }

    fn is_self_or_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }

    fn insertion_target(&mut self, from: NodeId, at: Position, focus: Option<NodeId>) -> NodeId {
        let mut node = from;
        loop {
            let children = match self.node(node) {
                Some(n) => n.children.clone(),
                None => return node,
            };

            let mut candidates = Vec::new();
            for child in children {
                let Some(c) = self.node(child) else {
                    continue;
                };
                let span = c.span;
                if !c.kind.is_editable() {
                    if span.start < at && at < span.end {
                        self.kill(child);
                    }
                } else if span.contains(at) {
                    candidates.push(child);
                }
            }

            let next = candidates
                .iter()
                .copied()
                .find(|c| focus.is_some_and(|f| self.is_self_or_ancestor(*c, f)))
                .or_else(|| candidates.first().copied());
            match next {
                Some(child) => node = child,
                None => return node,
            }
        }
    }

    fn replay_delete(&mut self, node: NodeId, at: Position, text: &str) -> Result<(), ReplayError> {
        let del_end = at.advanced_by(text);

        loop {
            let current = self.node(node).ok_or(ReplayError::MissingNode(node.0))?;
            let mut action = None;
            for &child in &current.children {
                let Some(c) = self.node(child) else {
                    continue;
                };
                let s = c.span;

                if s.start <= at && at < s.end && del_end <= s.end {
                    action = Some(if c.kind.is_editable() {
                        DeleteAction::Descend(child)
                    } else {
                        DeleteAction::Kill(child)
                    });
                    break;
                }

                let covered = if s.is_empty() {
                    at < s.start && s.end < del_end
                } else {
                    (at < s.start && s.end <= del_end) || (at <= s.start && s.end < del_end)
                };
                if covered {
                    action = Some(DeleteAction::Kill(child));
                    break;
                }

                if at < s.start && s.start < del_end {
                    action = Some(DeleteAction::Split(columns_between(at, s.start)?));
                    break;
                }
                if s.start <= at && at < s.end && s.end < del_end {
                    action = Some(DeleteAction::Split(columns_between(at, s.end)?));
                    break;
                }
            }

            match action {
                Some(DeleteAction::Descend(child)) => return self.replay_delete(child, at, text),
                Some(DeleteAction::Kill(child)) => {
                    trace!(node = child.0, "deletion removed node");
                    self.kill(child);
                }
                Some(DeleteAction::Split(count)) => {
                    if count == 0 || count >= char_len(text) {
                        return Err(ReplayError::OutOfRange(at));
                    }
                    self.replay_delete(node, at, char_prefix(text, count))?;
                    return self.replay_delete(node, at, char_suffix_from(text, count));
                }
                None => break,
            }
        }

        self.apply_change(
            Change {
                start: at,
                old_end: del_end,
                new_end: at,
            },
            Some(node),
        );
        Ok(())
    }

    /// Move every live position for `change`. `target` and its ancestors grow or shrink at the
    /// end; everything else is mapped as an interval offset.
    pub fn apply_change(&mut self, change: Change, target: Option<NodeId>) {
        let mut chain = Vec::new();
        let mut cursor = target;
        while let Some(id) = cursor.filter(|id| self.is_alive(*id)) {
            chain.push(id);
            cursor = self.parent(id);
        }

        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if !node.alive {
                continue;
            }
            let span = node.span;
            let (start, end) = if chain.contains(&NodeId(idx)) {
                let end = if span.end >= change.old_end {
                    change.shift(span.end)
                } else {
                    change.new_end
                };
                (span.start, end)
            } else {
                (
                    change.map(span.start, false),
                    change.map(span.end, span.start < change.start),
                )
            };
            node.span = Span::new(start, end.max(start));
        }
    }

    /// Rewrite every mirror whose text differs from its tabstop's (transformed) text.
    ///
    /// Repeats until nothing changes or `max_passes` is reached. Mirrors of killed tabstops are
    /// cleared and removed. `cursor` is moved along with the rewritten text. Returns `true` if
    /// the buffer was modified.
    pub fn update_mirrors(
        &mut self,
        buffer: &mut dyn TextBuffer,
        max_passes: usize,
        cursor: &mut Position,
    ) -> Result<bool, SnippetError> {
        let mut modified = false;
        for _ in 0..max_passes {
            let mut changed = false;
            for id in self.preorder() {
                let Some(node) = self.node(id) else {
                    continue;
                };
                let NodeKind::Mirror {
                    number,
                    instance,
                    transform,
                } = &node.kind
                else {
                    continue;
                };
                let mirror_span = node.span;

                let source = self
                    .instance(*instance)
                    .and_then(|state| state.tabstop(*number))
                    .and_then(|tabstop| self.span(tabstop));
                let wanted = match source {
                    Some(span) => {
                        let text = buffer.text_in(span);
                        match transform {
                            Some(t) => t.apply(&text),
                            None => text,
                        }
                    }
                    None => String::new(),
                };

                if buffer.text_in(mirror_span) != wanted {
                    buffer.replace(mirror_span, &wanted)?;
                    let change = Change {
                        start: mirror_span.start,
                        old_end: mirror_span.end,
                        new_end: mirror_span.start.advanced_by(&wanted),
                    };
                    *cursor = change.map_cursor(*cursor);
                    self.apply_change(change, Some(id));
                    changed = true;
                }
                if source.is_none() {
                    self.kill(id);
                }
            }
            if !changed {
                break;
            }
            modified = true;
        }
        Ok(modified)
    }

    /// Live node ids in document pre-order.
    fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive && n.parent.is_none())
            .map(|(idx, _)| NodeId(idx))
            .rev()
            .collect();
        while let Some(id) = pending.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push(id);
            pending.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// A pre-order listing of every live node with its depth.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.preorder()
            .into_iter()
            .filter_map(|id| {
                let node = self.node(id)?;
                let mut depth = 0;
                let mut parent = node.parent;
                while let Some(p) = parent {
                    depth += 1;
                    parent = self.parent(p);
                }
                let kind = match &node.kind {
                    NodeKind::Snippet(state) => {
                        SnapshotKind::Snippet(state.definition.trigger().text().to_string())
                    }
                    NodeKind::Tabstop { number, .. } => SnapshotKind::Tabstop(*number),
                    NodeKind::Mirror { number, .. } => SnapshotKind::Mirror(*number),
                };
                Some(NodeSnapshot {
                    id,
                    kind,
                    span: node.span,
                    depth,
                })
            })
            .collect()
    }
}

fn columns_between(from: Position, to: Position) -> Result<usize, ReplayError> {
    if from.line != to.line || to.column < from.column {
        return Err(ReplayError::OutOfRange(to));
    }
    Ok(to.column - from.column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;
    use crate::edit::EditOp;
    use crate::template::{RenderContext, Template};
    use crate::trigger::TriggerMatch;

    fn expand(tree: &mut SnippetTree, body: &str) -> (NodeId, Rendered) {
        let definition = Arc::new(SnippetDefinition::new("t", body, "", "").unwrap());
        let template = Template::parse(body).unwrap();
        let trigger_match = TriggerMatch::default();
        let globals = BTreeMap::new();
        let ctx = RenderContext {
            visual: None,
            trigger_match: &trigger_match,
            globals: &globals,
        };
        let rendered = template.render(Position::new(0, 0), "", &ctx);
        let id = tree.instantiate(None, definition, &rendered, Span::empty_at(Position::new(0, 0)));
        (id, rendered)
    }

    fn tabstop_span(tree: &SnippetTree, root: NodeId, number: usize) -> Option<Span> {
        tree.span(tree.instance(root)?.tabstop(number)?)
    }

    fn span(l1: usize, c1: usize, l2: usize, c2: usize) -> Span {
        Span::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    fn insert(line: usize, column: usize, text: &str) -> EditScript {
        EditScript::from_ops(vec![EditOp::Insert {
            at: Position::new(line, column),
            text: text.to_string(),
        }])
    }

    fn delete(line: usize, column: usize, text: &str) -> EditScript {
        EditScript::from_ops(vec![EditOp::Delete {
            at: Position::new(line, column),
            text: text.to_string(),
        }])
    }

    #[test]
    fn test_jump_order_visits_numbers_ascending_then_zero() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "$3 ${1:a} $2");
        let visited: Vec<usize> = std::iter::from_fn(|| tree.select_next(root, false))
            .map(|(n, _)| n)
            .take(10)
            .collect::<Vec<_>>()
            .into_iter()
            .take_while(|n| *n != 0)
            .collect();
        assert_eq!(visited, vec![1, 2, 3]);
        assert_eq!(tree.instance(root).unwrap().current(), None);
    }

    #[test]
    fn test_backward_jump_from_first_stays() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:a} ${2:b}");
        assert_eq!(tree.select_next(root, false).map(|(n, _)| n), Some(1));
        assert_eq!(tree.select_next(root, true).map(|(n, _)| n), Some(1));
        assert_eq!(tree.select_next(root, false).map(|(n, _)| n), Some(2));
        assert_eq!(tree.select_next(root, true).map(|(n, _)| n), Some(1));
    }

    #[test]
    fn test_overtyping_tabstop_moves_following_nodes() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "for (${1:i} = 0; $1 < ${2:n}; $1++) {\n\t$0\n}");
        tree.select_next(root, false);
        let focus = tree.current_tabstop_node(root);

        let script = EditScript::from_ops(vec![
            EditOp::Delete {
                at: Position::new(0, 5),
                text: "i".to_string(),
            },
            EditOp::Insert {
                at: Position::new(0, 5),
                text: "jj".to_string(),
            },
        ]);
        tree.replay(root, &script, focus).unwrap();

        assert_eq!(tabstop_span(&tree, root, 1), Some(span(0, 5, 0, 7)));
        assert_eq!(tabstop_span(&tree, root, 2), Some(span(0, 17, 0, 18)));
        assert_eq!(tabstop_span(&tree, root, 0), Some(span(1, 1, 1, 1)));
        assert_eq!(tree.span(root), Some(span(0, 0, 2, 1)));
    }

    #[test]
    fn test_insertion_prefers_focused_tabstop() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:a}${2:b}");
        let tab2 = tree.instance(root).unwrap().tabstop(2);
        tree.replay(root, &insert(0, 1, "x"), tab2).unwrap();
        assert_eq!(tabstop_span(&tree, root, 1), Some(span(0, 0, 0, 1)));
        assert_eq!(tabstop_span(&tree, root, 2), Some(span(0, 1, 0, 3)));

        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:a}${2:b}");
        tree.replay(root, &insert(0, 1, "x"), None).unwrap();
        assert_eq!(tabstop_span(&tree, root, 1), Some(span(0, 0, 0, 2)));
        assert_eq!(tabstop_span(&tree, root, 2), Some(span(0, 2, 0, 3)));
    }

    #[test]
    fn test_insertion_inside_mirror_kills_it() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:ab} $1");
        tree.replay(root, &insert(0, 4, "x"), None).unwrap();
        let mirrors = tree
            .snapshot()
            .into_iter()
            .filter(|n| matches!(n.kind, SnapshotKind::Mirror(_)))
            .count();
        assert_eq!(mirrors, 0);
        assert_eq!(tree.span(root), Some(span(0, 0, 0, 6)));
    }

    #[test]
    fn test_deleting_a_whole_tabstop_kills_it() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "a ${1:bc} d ${2:e}");
        tree.replay(root, &delete(0, 1, " bc "), None).unwrap();
        assert_eq!(tree.instance(root).unwrap().tabstop(1), None);
        assert_eq!(tabstop_span(&tree, root, 2), Some(span(0, 3, 0, 4)));
        assert_eq!(tree.select_next(root, false).map(|(n, _)| n), Some(2));
    }

    #[test]
    fn test_replay_against_mismatched_text_restores_the_tree() {
        let mut tree = SnippetTree::new();
        let (root, rendered) = expand(&mut tree, "a ${1:bc} d ${2:e}");
        let remembered = vec![rendered.text.clone()];
        let before = tree.snapshot();

        // The first deletion is real and kills tabstop 1; the second claims text that is not
        // there, so nothing may stick.
        let script = EditScript::from_ops(vec![
            EditOp::Delete {
                at: Position::new(0, 1),
                text: " bc ".to_string(),
            },
            EditOp::Delete {
                at: Position::new(0, 1),
                text: "zz".to_string(),
            },
        ]);
        assert_eq!(
            tree.replay_against(root, &script, None, &remembered, 0),
            Err(ReplayError::Mismatch(Position::new(0, 1)))
        );
        assert_eq!(tree.snapshot(), before);
        assert!(tree.instance(root).unwrap().tabstop(1).is_some());

        tree.replay_against(root, &delete(0, 1, " bc "), None, &remembered, 0)
            .unwrap();
        assert_eq!(tree.instance(root).unwrap().tabstop(1), None);
    }

    #[test]
    fn test_deletion_straddling_a_boundary_is_split() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "ab${1:cd}ef");
        // Deletes "bc": "b" belongs to the root, "c" to tabstop 1.
        tree.replay(root, &delete(0, 1, "bc"), None).unwrap();
        assert_eq!(tabstop_span(&tree, root, 1), Some(span(0, 1, 0, 2)));
        assert_eq!(tree.span(root), Some(span(0, 0, 0, 4)));
    }

    #[test]
    fn test_newline_shifts_later_lines() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "a${1:x}b\n$2");
        tree.replay(root, &insert(0, 3, "\n"), None).unwrap();
        assert_eq!(tabstop_span(&tree, root, 1), Some(span(0, 1, 0, 2)));
        assert_eq!(tabstop_span(&tree, root, 2), Some(span(2, 0, 2, 0)));
        assert_eq!(tree.span(root), Some(span(0, 0, 2, 0)));
    }

    #[test]
    fn test_empty_script_changes_nothing() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:a} $1 ${2:b}");
        let before = tree.snapshot();
        tree.replay(root, &EditScript::new(), None).unwrap();
        assert_eq!(tree.snapshot(), before);
    }

    #[test]
    fn test_edits_before_the_snippet_only_move_it() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "${1:a}");
        // Shift the whole snippet by pretending it sits at column 2 of line 1.
        tree.apply_change(
            Change {
                start: Position::new(0, 0),
                old_end: Position::new(0, 0),
                new_end: Position::new(1, 2),
            },
            None,
        );
        assert_eq!(tree.span(root), Some(span(1, 2, 1, 3)));
        tree.replay(root, &insert(0, 0, "zz"), None).unwrap();
        assert_eq!(tree.span(root), Some(span(1, 2, 1, 3)));
        tree.replay(root, &insert(1, 0, "zz"), None).unwrap();
        assert_eq!(tree.span(root), Some(span(1, 4, 1, 5)));
    }

    #[test]
    fn test_update_mirrors_rewrites_buffer() {
        let mut tree = SnippetTree::new();
        let (root, rendered) = expand(&mut tree, r"${1:ab} $1 ${1/(.*)/\U$1/}");
        let mut buffer = RopeBuffer::new(&rendered.text);
        assert_eq!(buffer.text(), "ab ab AB");

        buffer
            .replace(span(0, 2, 0, 2), "c")
            .unwrap();
        tree.replay(root, &insert(0, 2, "c"), None).unwrap();
        let mut cursor = Position::new(0, 3);
        assert!(tree.update_mirrors(&mut buffer, 16, &mut cursor).unwrap());
        assert_eq!(buffer.text(), "abc abc ABC");
        assert_eq!(cursor, Position::new(0, 3));
        assert_eq!(tree.span(root), Some(span(0, 0, 0, 11)));

        assert!(!tree.update_mirrors(&mut buffer, 16, &mut cursor).unwrap());
    }

    #[test]
    fn test_mirror_of_killed_tabstop_is_cleared() {
        let mut tree = SnippetTree::new();
        let (root, rendered) = expand(&mut tree, "<${1:ab}>$1");
        let mut buffer = RopeBuffer::new(&rendered.text);
        buffer.replace(span(0, 0, 0, 4), "").unwrap();
        tree.replay(root, &delete(0, 0, "<ab>"), None).unwrap();
        let mut cursor = Position::new(0, 0);
        tree.update_mirrors(&mut buffer, 16, &mut cursor).unwrap();
        assert_eq!(buffer.text(), "");
        assert_eq!(tree.snapshot().len(), 2);
    }

    #[test]
    fn test_find_parent_for_new() {
        let mut tree = SnippetTree::new();
        let (root, _) = expand(&mut tree, "x ${1:ab ${2:cd}} $3");
        let tab1 = tree.instance(root).unwrap().tabstop(1).unwrap();
        let tab2 = tree.instance(root).unwrap().tabstop(2).unwrap();
        let tab3 = tree.instance(root).unwrap().tabstop(3).unwrap();
        assert_eq!(tree.find_parent_for_new(root, Position::new(0, 0)), root);
        assert_eq!(tree.find_parent_for_new(root, Position::new(0, 3)), tab1);
        assert_eq!(tree.find_parent_for_new(root, Position::new(0, 5)), tab2);
        assert_eq!(tree.find_parent_for_new(root, Position::new(0, 8)), tab3);
    }
}
