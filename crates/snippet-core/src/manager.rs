//! The snippet manager.
//!
//! [`SnippetManager`] is the single stateful object a host keeps per editing session. It owns
//! the stack of active snippet instances, the tabstop tree they live in, the cursor history
//! used to reconcile freeform edits, and the per-buffer filetype scopes.
//!
//! # Lifecycle
//!
//! ```text
//!            expand                     jump to $0 / cursor leaves / leaving_buffer
//! Inactive ─────────▶ Active (stack ≥ 1) ─────────────────────────────────────────▶ Inactive
//!                      │  ▲
//!                      └──┘ expand (nested), jump, cursor_moved
//! ```
//!
//! Every public operation returns an outcome and never an error: internal failures are logged,
//! reported to the [`OutcomeSink`], and the active stack is unwound to empty.
//!
//! # Example
//!
//! ```rust
//! use snippet_core::{Outcome, RopeBuffer, SnippetDefinition, SnippetManager, TextBuffer, Position};
//!
//! let mut manager = SnippetManager::default();
//! manager.add_snippet(SnippetDefinition::new("hi", "hello ${1:world}$0", "", "").unwrap());
//!
//! let mut buffer = RopeBuffer::new("hi");
//! buffer.set_cursor(Position::new(0, 2));
//! assert_eq!(manager.expand(&mut buffer), Outcome::Expanded);
//! assert_eq!(buffer.text(), "hello world");
//! assert_eq!(manager.current_tabstop(), Some(1));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::buffer::TextBuffer;
use crate::definition::{DEFAULT_SCOPE, SnippetDefinition};
use crate::diff::diff;
use crate::edit::{EditOp, EditScript};
use crate::error::SnippetError;
use crate::geometry::{Position, Span, char_len, char_prefix};
use crate::guess::guess_edit;
use crate::provider::{
    ChoicePrompt, FirstChoice, LogSink, Outcome, OutcomeSink, SnippetMatch, SnippetProvider,
    SnippetStore,
};
use crate::template::{RenderContext, Template};
use crate::tracker::{CursorSnapshot, EditTracker, VisualContent, VisualMode};
use crate::tree::{NodeId, NodeSnapshot, SnippetTree};
use crate::trigger::TriggerMatch;

/// Manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Key reported back when an expansion finds nothing.
    pub expand_trigger: String,
    /// Key reported back when a forward jump finds nothing.
    pub jump_forward_trigger: String,
    /// Key reported back when a backward jump finds nothing.
    pub jump_backward_trigger: String,
    /// Number of cursor snapshots kept for edit guessing.
    pub history_len: usize,
    /// Upper bound on mirror update passes after one reconciliation.
    pub max_mirror_passes: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            expand_trigger: "<tab>".to_string(),
            jump_forward_trigger: "<c-j>".to_string(),
            jump_backward_trigger: "<c-k>".to_string(),
            history_len: 5,
            max_mirror_passes: 16,
        }
    }
}

/// What [`SnippetManager::cursor_moved`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No snippet is active, or the snippet text did not change.
    NoOp,
    /// An edit script was replayed onto the tabstop tree.
    Replayed {
        /// Number of operations in the replayed script.
        operations: usize,
    },
    /// The edit could not be mapped onto the tree; the tree was left as it was.
    Desynced,
}

/// Snippet engine state for one editing session.
pub struct SnippetManager {
    config: ManagerConfig,
    store: SnippetStore,
    providers: Vec<Box<dyn SnippetProvider>>,
    prompt: Box<dyn ChoicePrompt>,
    sink: Box<dyn OutcomeSink>,
    tree: SnippetTree,
    /// Active instances, outermost first.
    stack: Vec<NodeId>,
    tracker: EditTracker,
    visual: VisualContent,
    filetypes: HashMap<usize, Vec<String>>,
}

impl Default for SnippetManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl SnippetManager {
    /// Create a manager with an empty store, a [`FirstChoice`] prompt and a [`LogSink`].
    pub fn new(config: ManagerConfig) -> Self {
        let tracker = EditTracker::new(config.history_len);
        Self {
            config,
            store: SnippetStore::new(),
            providers: Vec::new(),
            prompt: Box::new(FirstChoice),
            sink: Box::new(LogSink),
            tree: SnippetTree::new(),
            stack: Vec::new(),
            tracker,
            visual: VisualContent::default(),
            filetypes: HashMap::new(),
        }
    }

    /// Use `prompt` to resolve ambiguous matches.
    pub fn with_prompt(mut self, prompt: impl ChoicePrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// Report outcomes and internal failures to `sink`.
    pub fn with_sink(mut self, sink: impl OutcomeSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Register an additional definition source, queried after the built-in store.
    pub fn add_provider(&mut self, provider: impl SnippetProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Register a definition in the built-in store.
    pub fn add_snippet(&mut self, definition: SnippetDefinition) {
        trace!(trigger = definition.trigger().text(), scope = definition.scope(), "snippet added");
        self.store.add(definition);
    }

    /// The settings this manager was created with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ==================== Public operations ====================

    /// Expand the snippet whose trigger ends at the cursor.
    pub fn expand(&mut self, buffer: &mut dyn TextBuffer) -> Outcome {
        let key = self.config.expand_trigger.clone();
        let outcome = self
            .guarded("expand", |this| {
                Ok(this.try_expand(buffer)?.unwrap_or_else(|| failed(&key)))
            })
            .unwrap_or_else(|| failed(&key));
        self.report(outcome)
    }

    /// Select the next tabstop of the innermost active snippet.
    pub fn jump_forwards(&mut self, buffer: &mut dyn TextBuffer) -> Outcome {
        let key = self.config.jump_forward_trigger.clone();
        self.jump_outcome("jump_forwards", buffer, false, &key)
    }

    /// Select the previous tabstop of the innermost active snippet.
    pub fn jump_backwards(&mut self, buffer: &mut dyn TextBuffer) -> Outcome {
        let key = self.config.jump_backward_trigger.clone();
        self.jump_outcome("jump_backwards", buffer, true, &key)
    }

    /// Expand if a trigger matches, otherwise jump forward.
    pub fn expand_or_jump(&mut self, buffer: &mut dyn TextBuffer) -> Outcome {
        let key = self.config.expand_trigger.clone();
        let outcome = self
            .guarded("expand_or_jump", |this| {
                if let Some(outcome) = this.try_expand(buffer)? {
                    return Ok(outcome);
                }
                Ok(if this.jump(buffer, false, true)? {
                    Outcome::Jumped
                } else {
                    failed(&key)
                })
            })
            .unwrap_or_else(|| failed(&key));
        self.report(outcome)
    }

    /// Offer every snippet that could match the text before the cursor and expand the chosen
    /// one. An empty list or a declined prompt is [`Outcome::Cancelled`].
    pub fn list_snippets(&mut self, buffer: &mut dyn TextBuffer) -> Outcome {
        let key = self.config.expand_trigger.clone();
        let outcome = self
            .guarded("list_snippets", |this| {
                let (before, _) = buffer.current_line_split();
                let mut candidates = this.candidates(buffer.id(), &before, true);
                candidates.sort_by(|a, b| {
                    a.definition
                        .trigger()
                        .text()
                        .cmp(b.definition.trigger().text())
                });
                if candidates.is_empty() {
                    return Ok(Outcome::Cancelled);
                }
                match this.ask(candidates) {
                    Some(chosen) => {
                        this.do_snippet(buffer, &chosen, &before)?;
                        Ok(Outcome::Expanded)
                    }
                    None => Ok(Outcome::Cancelled),
                }
            })
            .unwrap_or_else(|| failed(&key));
        self.report(outcome)
    }

    /// Expand an ad-hoc snippet body.
    ///
    /// With a non-empty `trigger`, the trigger must match the text before the cursor and is
    /// replaced like a regular one.
    pub fn expand_anon(
        &mut self,
        buffer: &mut dyn TextBuffer,
        body: &str,
        trigger: &str,
        description: &str,
        options: &str,
        globals: BTreeMap<String, String>,
    ) -> Outcome {
        let key = self.config.expand_trigger.clone();
        let outcome = self
            .guarded("expand_anon", |this| {
                let definition = Arc::new(
                    SnippetDefinition::new(trigger, body, description, options)?
                        .with_globals(globals),
                );
                let (before, _) = buffer.current_line_split();
                let trigger_match = if trigger.is_empty() {
                    Some(TriggerMatch::default())
                } else {
                    definition.matches(&before)
                };
                let Some(trigger_match) = trigger_match else {
                    return Ok(failed(&key));
                };
                let chosen = SnippetMatch {
                    definition,
                    trigger_match,
                };
                this.do_snippet(buffer, &chosen, &before)?;
                Ok(Outcome::Expanded)
            })
            .unwrap_or_else(|| failed(&key));
        self.report(outcome)
    }

    /// Keep the current selection of `buffer` for the next `${VISUAL}`.
    ///
    /// Returns `false` when nothing is selected.
    pub fn save_last_visual_selection(&mut self, buffer: &dyn TextBuffer, mode: VisualMode) -> bool {
        self.visual.conserve(buffer, mode)
    }

    /// Reconcile the active snippets with whatever changed in `buffer` since the last call.
    ///
    /// Hosts call this after every cursor movement and text change.
    pub fn cursor_moved(&mut self, buffer: &mut dyn TextBuffer) -> ReconcileOutcome {
        self.guarded("cursor_moved", |this| this.reconcile(buffer))
            .unwrap_or(ReconcileOutcome::Desynced)
    }

    /// Finish every active snippet; the host switched buffers or windows.
    pub fn leaving_buffer(&mut self) {
        if !self.stack.is_empty() {
            debug!(depth = self.stack.len(), "leaving buffer; finishing all snippets");
        }
        self.leave_all();
    }

    /// Return to the freshly constructed state, keeping configuration and collaborators.
    ///
    /// Finishes all snippets, drops stored definitions, filetypes and visual content.
    pub fn reset(&mut self) {
        self.leave_all();
        self.store.clear();
        self.filetypes.clear();
        self.visual.reset();
        self.tracker.reset();
    }

    // ==================== Filetypes ====================

    /// Add dot-separated filetypes (`"c.doxygen"`) to a buffer's scopes.
    ///
    /// Each unknown filetype is inserted right after the previous one of the same call, so the
    /// first one becomes the primary filetype of a fresh buffer.
    pub fn add_buffer_filetypes(&mut self, buffer_id: usize, filetypes: &str) {
        let list = self
            .filetypes
            .entry(buffer_id)
            .or_insert_with(|| vec![DEFAULT_SCOPE.to_string()]);
        let mut last: Option<usize> = None;
        for filetype in filetypes.split('.').map(str::trim).filter(|f| !f.is_empty()) {
            match list.iter().position(|known| known == filetype) {
                Some(found) => last = Some(found),
                None => {
                    let at = last.map_or(0, |idx| idx + 1);
                    list.insert(at, filetype.to_string());
                    last = Some(at);
                }
            }
        }
    }

    /// Forget the scopes of a buffer.
    pub fn reset_buffer_filetypes(&mut self, buffer_id: usize) {
        self.filetypes.remove(&buffer_id);
    }

    /// Scopes of a buffer, primary first.
    pub fn buffer_filetypes(&self, buffer_id: usize) -> Vec<&str> {
        match self.filetypes.get(&buffer_id) {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => vec![DEFAULT_SCOPE],
        }
    }

    /// The first scope of a buffer.
    pub fn primary_filetype(&self, buffer_id: usize) -> &str {
        self.filetypes
            .get(&buffer_id)
            .and_then(|list| list.first())
            .map_or(DEFAULT_SCOPE, String::as_str)
    }

    // ==================== Queries ====================

    /// Number of active snippet instances.
    pub fn active_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of the selected tabstop of the innermost active snippet.
    pub fn current_tabstop(&self) -> Option<usize> {
        let top = self.stack.last()?;
        self.tree.instance(*top)?.current()
    }

    /// Pre-order listing of the tabstop tree.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.tree.snapshot()
    }

    // ==================== Internals ====================

    fn report(&mut self, outcome: Outcome) -> Outcome {
        self.sink.notify(&outcome);
        outcome
    }

    /// Run `body`; on error, log it, report it to the sink and unwind the stack.
    fn guarded<T>(
        &mut self,
        operation: &str,
        body: impl FnOnce(&mut Self) -> Result<T, SnippetError>,
    ) -> Option<T> {
        match body(self) {
            Ok(value) => Some(value),
            Err(err) => {
                let detail = error_chain(&err);
                error!(operation, %detail, "snippet operation aborted");
                self.sink.report_error(&detail);
                self.leave_all();
                None
            }
        }
    }

    fn jump_outcome(
        &mut self,
        operation: &str,
        buffer: &mut dyn TextBuffer,
        backwards: bool,
        key: &str,
    ) -> Outcome {
        let outcome = self
            .guarded(operation, |this| this.jump(buffer, backwards, true))
            .filter(|jumped| *jumped)
            .map_or_else(|| failed(key), |_| Outcome::Jumped);
        self.report(outcome)
    }

    /// Matching candidates for `before` across the buffer's scopes, with `!` overrides applied.
    fn candidates(&self, buffer_id: usize, before: &str, potentially: bool) -> Vec<SnippetMatch> {
        let mut found = Vec::new();
        for scope in self.buffer_filetypes(buffer_id).into_iter().rev() {
            found.extend(self.store.matching_snippets(scope, before, potentially));
            for provider in &self.providers {
                found.extend(provider.matching_snippets(scope, before, potentially));
            }
        }

        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, candidate) in found.iter().enumerate() {
            let trigger = candidate.definition.trigger().text();
            let group = groups.entry(trigger).or_default();
            if candidate.definition.options().overwrite {
                group.clear();
            }
            group.push(idx);
        }
        let kept: HashSet<usize> = groups.into_values().flatten().collect();

        found
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| kept.contains(idx))
            .map(|(_, candidate)| candidate)
            .collect()
    }

    fn ask(&mut self, candidates: Vec<SnippetMatch>) -> Option<SnippetMatch> {
        let labels: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.definition.choice_label())
            .collect();
        let index = self.prompt.choose(&labels)?;
        debug!(index, label = ?labels.get(index), "snippet chosen");
        candidates.into_iter().nth(index)
    }

    /// `Ok(None)`: nothing matched. `Ok(Some(Cancelled))`: the user declined the prompt.
    fn try_expand(&mut self, buffer: &mut dyn TextBuffer) -> Result<Option<Outcome>, SnippetError> {
        let (before, _) = buffer.current_line_split();
        if before.is_empty() {
            return Ok(None);
        }

        let candidates = self.candidates(buffer.id(), &before, false);
        let chosen = match candidates.len() {
            0 => return Ok(None),
            1 => candidates.into_iter().next(),
            _ => self.ask(candidates),
        };

        match chosen {
            Some(chosen) => {
                self.do_snippet(buffer, &chosen, &before)?;
                Ok(Some(Outcome::Expanded))
            }
            None => Ok(Some(Outcome::Cancelled)),
        }
    }

    fn do_snippet(
        &mut self,
        buffer: &mut dyn TextBuffer,
        chosen: &SnippetMatch,
        before: &str,
    ) -> Result<(), SnippetError> {
        let definition = &chosen.definition;
        let before_len = char_len(before);
        let kept = before_len.saturating_sub(char_len(&chosen.trigger_match.matched));
        let text_before = char_prefix(before, kept);

        let line = buffer.cursor().line;
        let trigger = Span::new(Position::new(line, kept), Position::new(line, before_len));
        let parent = self.parent_for_new(trigger.start);

        let body = definition.prepare_body(text_before, &buffer.indent_style());
        let template = Template::parse(&body)?;
        let rendered = {
            let ctx = RenderContext {
                visual: self.visual.text_for_expansion(),
                trigger_match: &chosen.trigger_match,
                globals: definition.globals(),
            };
            template.render(trigger.start, text_before, &ctx)
        };

        buffer.replace(trigger, &rendered.text)?;
        let id = self
            .tree
            .instantiate(parent, Arc::clone(definition), &rendered, trigger);
        self.visual.reset();
        self.stack.push(id);
        debug!(
            trigger = definition.trigger().text(),
            span = %rendered.span,
            depth = self.stack.len(),
            nested = parent.is_some(),
            "snippet expanded"
        );

        self.remember_root(buffer);
        self.jump(buffer, false, false)?;
        Ok(())
    }

    /// The node a snippet expanded at `start` nests in.
    ///
    /// Active instances above the innermost one containing `start` are finished. `None` means
    /// nothing contains `start` and the stack is now empty.
    fn parent_for_new(&mut self, start: Position) -> Option<NodeId> {
        while let Some(&top) = self.stack.last() {
            if self.tree.span(top).is_some_and(|span| span.contains(start)) {
                return Some(self.tree.find_parent_for_new(top, start));
            }
            debug!(instance = top.index(), "expansion outside active snippet");
            self.finish_top();
        }
        None
    }

    /// Select the next tabstop of the top instance. `requested` is set for user jumps.
    fn jump(
        &mut self,
        buffer: &mut dyn TextBuffer,
        backwards: bool,
        requested: bool,
    ) -> Result<bool, SnippetError> {
        while let Some(&top) = self.stack.last() {
            let Some((number, _)) = self.tree.select_next(top, backwards) else {
                warn!(instance = top.index(), "active snippet has no tabstop to select; finishing it");
                self.finish_top();
                continue;
            };

            let strip = self
                .tree
                .instance(top)
                .is_some_and(|state| state.definition().options().strip_trailing);
            if requested && self.tree.take_first_jump(top) && strip {
                self.strip_trailing_whitespace(buffer)?;
            }

            let Some(span) = self
                .tree
                .instance(top)
                .and_then(|state| state.tabstop(number))
                .and_then(|node| self.tree.span(node))
            else {
                warn!(tabstop = number, "selected tabstop vanished; finishing snippet");
                self.finish_top();
                continue;
            };

            buffer.select(span);
            debug!(tabstop = number, %span, backwards, "jumped");
            if number == 0 {
                self.finish_top();
            }
            self.tracker.remember_position(CursorSnapshot::of(buffer));
            self.remember_root(buffer);
            return Ok(true);
        }
        Ok(false)
    }

    /// Remove whitespace before the cursor when nothing follows it on the line.
    fn strip_trailing_whitespace(&mut self, buffer: &mut dyn TextBuffer) -> Result<(), SnippetError> {
        let (before, after) = buffer.current_line_split();
        let kept = before.trim_end();
        if !after.is_empty() || kept.len() == before.len() {
            return Ok(());
        }

        let removed = &before[kept.len()..];
        let at = Position::new(buffer.cursor().line, char_len(kept));
        buffer.replace(Span::new(at, at.advanced_by(removed)), "")?;
        buffer.set_cursor(at);

        if let Some(&root) = self.stack.first() {
            let script = EditScript::from_ops(vec![EditOp::Delete {
                at,
                text: removed.to_string(),
            }]);
            self.tree.replay(root, &script, None)?;
        }
        trace!(%at, "stripped trailing whitespace");
        Ok(())
    }

    fn reconcile(&mut self, buffer: &mut dyn TextBuffer) -> Result<ReconcileOutcome, SnippetError> {
        self.tracker.remember_position(CursorSnapshot::of(buffer));
        let Some(&root) = self.stack.first() else {
            return Ok(ReconcileOutcome::NoOp);
        };

        let mut outcome = ReconcileOutcome::NoOp;
        if let Some(root_span) = self.tree.span(root) {
            let script = self.infer_edit(buffer, root_span);
            if !script.is_empty() {
                outcome = self.replay_onto_root(root, root_span.start.line, &script);
            }
        }

        self.leave_instances_without(buffer.cursor());
        if !self.stack.is_empty() {
            let mut cursor = buffer.cursor();
            if self
                .tree
                .update_mirrors(buffer, self.config.max_mirror_passes, &mut cursor)?
            {
                buffer.set_cursor(cursor);
            }
            self.remember_root(buffer);
        }
        Ok(outcome)
    }

    /// Replay `script`, computed against the remembered lines starting at `first_line`.
    fn replay_onto_root(
        &mut self,
        root: NodeId,
        first_line: usize,
        script: &EditScript,
    ) -> ReconcileOutcome {
        let focus = self
            .stack
            .last()
            .and_then(|top| self.tree.current_tabstop_node(*top));
        let remembered = self.tracker.remembered_lines();
        match self
            .tree
            .replay_against(root, script, focus, remembered, first_line)
        {
            Ok(()) => ReconcileOutcome::Replayed {
                operations: script.len(),
            },
            Err(err) => {
                warn!(%err, "edit could not be replayed; snippet left unchanged");
                ReconcileOutcome::Desynced
            }
        }
    }

    /// Explain the change between the remembered snippet lines and the buffer.
    fn infer_edit(&self, buffer: &dyn TextBuffer, root_span: Span) -> EditScript {
        let start = root_span.start.line;
        let delta = self.tracker.diff_in_buffer_length(buffer.line_count());
        let end = (root_span.end.line as isize + delta + 1).max(start as isize) as usize;
        let current = buffer.lines(start, end);

        let previous = self.tracker.ppos();
        let now = self.tracker.pos();
        let (first_line, old, new) = trim_window(
            start,
            self.tracker.remembered_lines(),
            &current,
            previous.position.line,
            now.position.line,
        );
        if old == new {
            return EditScript::new();
        }

        match guess_edit(first_line, old, new, &previous, &now) {
            Some(script) => {
                trace!(first_line, ops = script.len(), "edit guessed from cursor movement");
                script
            }
            None => {
                let script = diff(&old.join("\n"), &new.join("\n"), first_line);
                trace!(first_line, ops = script.len(), "edit computed by diff");
                script
            }
        }
    }

    fn leave_instances_without(&mut self, cursor: Position) {
        while let Some(&top) = self.stack.last() {
            if self.tree.span(top).is_some_and(|span| span.contains(cursor)) {
                return;
            }
            debug!(instance = top.index(), %cursor, "cursor left snippet");
            self.finish_top();
        }
    }

    fn remember_root(&mut self, buffer: &dyn TextBuffer) {
        if let Some(span) = self.stack.first().and_then(|root| self.tree.span(*root)) {
            self.tracker.remember_buffer(buffer, span);
        }
    }

    fn finish_top(&mut self) {
        if let Some(id) = self.stack.pop() {
            debug!(instance = id.index(), depth = self.stack.len(), "snippet finished");
        }
        if self.stack.is_empty() {
            self.tree.clear();
            self.tracker.reset();
        }
    }

    fn leave_all(&mut self) {
        while !self.stack.is_empty() {
            self.finish_top();
        }
        self.tree.clear();
    }
}

fn failed(key: &str) -> Outcome {
    Outcome::Failed {
        fallback_key: key.to_string(),
    }
}

/// `err` followed by every source not already part of its message.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }
    detail
}

/// Narrow the remembered (`old`) and current (`new`) snippet lines to the changed region.
///
/// Equal trailing lines are dropped while both cursor lines stay above them, then equal
/// leading lines while both cursor lines are at or below them. One line of context is kept on
/// each trimmed side, so both cursor lines always remain inside the window. Returns the first buffer line of the window and the two windows.
fn trim_window<'a>(
    first_line: usize,
    old: &'a [String],
    new: &'a [String],
    previous_line: usize,
    current_line: usize,
) -> (usize, &'a [String], &'a [String]) {
    let (mut old_start, mut old_end) = (0, old.len());
    let (mut new_start, mut new_end) = (0, new.len());
    let mut line = first_line;

    while old_start < old_end
        && new_start < new_end
        && old[old_end - 1] == new[new_end - 1]
        && previous_line + 1 < first_line + old_end
        && current_line + 1 < first_line + new_end
    {
        old_end -= 1;
        new_end -= 1;
    }
    while old_start < old_end
        && new_start < new_end
        && old[old_start] == new[new_start]
        && previous_line >= line
        && current_line >= line
    {
        old_start += 1;
        new_start += 1;
        line += 1;
    }

    if old_start > 0 {
        old_start -= 1;
        new_start -= 1;
        line -= 1;
    }
    if old_end < old.len() {
        old_end += 1;
        new_end += 1;
    }

    (line, &old[old_start..old_end], &new[new_start..new_end])
}
