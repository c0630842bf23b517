//! Collaborators the manager calls out to: definition providers, the choice prompt, and the
//! outcome sink.

use std::sync::Arc;

use tracing::{error, warn};

use crate::definition::SnippetDefinition;
use crate::trigger::TriggerMatch;

/// A definition together with how its trigger matched.
#[derive(Debug, Clone)]
pub struct SnippetMatch {
    /// The matching definition.
    pub definition: Arc<SnippetDefinition>,
    /// The matched part of the text before the cursor.
    pub trigger_match: TriggerMatch,
}

/// Source of snippet definitions.
pub trait SnippetProvider {
    /// Definitions in `scope` whose trigger matches the end of `before`, in registration order.
    ///
    /// With `potentially` set, prefix ("could match") matches are returned as well.
    fn matching_snippets(&self, scope: &str, before: &str, potentially: bool) -> Vec<SnippetMatch>;
}

/// In-memory provider; definitions added at runtime land here.
#[derive(Debug, Default, Clone)]
pub struct SnippetStore {
    snippets: Vec<Arc<SnippetDefinition>>,
}

impl SnippetStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition after every existing one.
    pub fn add(&mut self, definition: SnippetDefinition) {
        self.snippets.push(Arc::new(definition));
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Drop every definition.
    pub fn clear(&mut self) {
        self.snippets.clear();
    }
}

impl SnippetProvider for SnippetStore {
    fn matching_snippets(&self, scope: &str, before: &str, potentially: bool) -> Vec<SnippetMatch> {
        self.snippets
            .iter()
            .filter(|def| def.scope() == scope)
            .filter_map(|def| {
                let found = if potentially {
                    def.could_match(before)
                } else {
                    def.matches(before)
                };
                found.map(|trigger_match| SnippetMatch {
                    definition: Arc::clone(def),
                    trigger_match,
                })
            })
            .collect()
    }
}

/// Asks the user to pick one of several candidates.
pub trait ChoicePrompt {
    /// Return the zero-based index of the chosen label, or `None` if the user cancelled.
    fn choose(&mut self, labels: &[String]) -> Option<usize>;
}

/// A prompt that always picks the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstChoice;

impl ChoicePrompt for FirstChoice {
    fn choose(&mut self, labels: &[String]) -> Option<usize> {
        (!labels.is_empty()).then_some(0)
    }
}

/// Result of a public manager operation, reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A snippet was expanded.
    Expanded,
    /// A tabstop was selected.
    Jumped,
    /// The user declined the choice prompt; nothing happened.
    Cancelled,
    /// Nothing actionable. The host may feed `fallback_key` to its own handler.
    Failed {
        /// The trigger key the operation was bound to.
        fallback_key: String,
    },
}

impl Outcome {
    /// Returns `true` for everything except [`Outcome::Failed`].
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Receives outcomes and internal failure reports.
///
/// Both methods are best-effort notifications; nothing they do can affect the operation that
/// produced them.
pub trait OutcomeSink {
    /// A public operation finished with `outcome`.
    fn notify(&mut self, outcome: &Outcome) {
        if !outcome.succeeded() {
            warn!(?outcome, "snippet operation failed");
        }
    }

    /// An internal failure was caught; `detail` carries the full error chain.
    fn report_error(&mut self, detail: &str) {
        error!(detail, "snippet engine error");
    }
}

/// A sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl OutcomeSink for LogSink {}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SnippetStore {
        let mut store = SnippetStore::new();
        store.add(SnippetDefinition::new("for", "for", "", "").unwrap());
        store.add(SnippetDefinition::new("fn", "fn", "", "").unwrap().with_scope("rust"));
        store.add(SnippetDefinition::new("foreach", "foreach", "", "").unwrap());
        store
    }

    #[test]
    fn test_store_filters_by_scope_and_trigger() {
        let store = store();
        let found = store.matching_snippets("all", "x for", false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].definition.trigger().text(), "for");
        assert!(store.matching_snippets("rust", "for", false).is_empty());
        assert_eq!(store.matching_snippets("rust", "fn", false).len(), 1);
    }

    #[test]
    fn test_store_potential_matches_keep_registration_order() {
        let store = store();
        let found: Vec<_> = store
            .matching_snippets("all", "fo", true)
            .into_iter()
            .map(|m| m.definition.trigger().text().to_string())
            .collect();
        assert_eq!(found, vec!["for", "foreach"]);
    }

    #[test]
    fn test_first_choice() {
        let mut prompt = FirstChoice;
        assert_eq!(prompt.choose(&[]), None);
        assert_eq!(prompt.choose(&["a".to_string(), "b".to_string()]), Some(0));
    }

    #[test]
    fn test_outcome_success() {
        assert!(Outcome::Cancelled.succeeded());
        assert!(
            !Outcome::Failed {
                fallback_key: "<tab>".into()
            }
            .succeeded()
        );
    }
}
