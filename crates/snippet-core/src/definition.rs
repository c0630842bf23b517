//! Snippet definitions and body preparation.

use std::collections::BTreeMap;

use crate::error::SnippetError;
use crate::indent::{IndentStyle, leading_whitespace};
use crate::trigger::{Trigger, TriggerMatch, TriggerOptions};

/// Scope every buffer searches when it has no more specific filetype.
pub const DEFAULT_SCOPE: &str = "all";

/// An immutable snippet definition as handed out by a provider.
#[derive(Debug, Clone)]
pub struct SnippetDefinition {
    trigger: Trigger,
    body: String,
    description: String,
    scope: String,
    globals: BTreeMap<String, String>,
}

impl SnippetDefinition {
    /// Create a definition in the [`DEFAULT_SCOPE`].
    ///
    /// Fails only when `options` contains `r` and `trigger` is not a valid regex.
    pub fn new(
        trigger: &str,
        body: &str,
        description: &str,
        options: &str,
    ) -> Result<Self, SnippetError> {
        Ok(Self {
            trigger: Trigger::new(trigger, TriggerOptions::parse(options))?,
            body: body.to_string(),
            description: description.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            globals: BTreeMap::new(),
        })
    }

    /// Set the defining scope (a filetype-like tag).
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the named values `${NAME}` placeholders resolve to.
    pub fn with_globals(mut self, globals: BTreeMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    /// The trigger.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// The option flags.
    pub fn options(&self) -> TriggerOptions {
        self.trigger.options()
    }

    /// The raw body template.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The free-form description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The defining scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Named template values.
    pub fn globals(&self) -> &BTreeMap<String, String> {
        &self.globals
    }

    /// The line shown in a choice prompt: `"(trigger) description"`, trimmed.
    pub fn choice_label(&self) -> String {
        format!("({}) {}", self.trigger.text(), self.description)
            .trim()
            .to_string()
    }

    /// See [`Trigger::matches`].
    pub fn matches(&self, before: &str) -> Option<TriggerMatch> {
        self.trigger.matches(before)
    }

    /// See [`Trigger::could_match`].
    pub fn could_match(&self, before: &str) -> Option<TriggerMatch> {
        self.trigger.could_match(before)
    }

    /// Re-indent the body for insertion after `text_before`.
    ///
    /// Unless `t` is set, each line's leading tabs become `style` indentation. Every line after
    /// the first is additionally prefixed with the leading whitespace of `text_before`.
    pub fn prepare_body(&self, text_before: &str, style: &IndentStyle) -> String {
        let indent = leading_whitespace(text_before);
        let literal_tabs = self.options().literal_tabs;

        let mut lines = Vec::new();
        for (idx, line) in self.body.split('\n').enumerate() {
            let tabs = if literal_tabs {
                0
            } else {
                line.chars().take_while(|ch| *ch == '\t').count()
            };
            let mut out = String::with_capacity(line.len() + indent.len());
            if idx != 0 {
                out.push_str(indent);
            }
            out.push_str(&style.indent_for_levels(tabs));
            // Tabs are one byte each.
            out.push_str(&line[tabs..]);
            lines.push(out);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_label() {
        let def = SnippetDefinition::new("for", "for", "for loop", "").unwrap();
        assert_eq!(def.choice_label(), "(for) for loop");
        let bare = SnippetDefinition::new("x", "x", "", "").unwrap();
        assert_eq!(bare.choice_label(), "(x)");
    }

    #[test]
    fn test_prepare_body_inherits_indent() {
        let def = SnippetDefinition::new("def", "def ${1:name}():\n\t$0", "", "w").unwrap();
        let body = def.prepare_body("   ", &IndentStyle::spaces(4));
        assert_eq!(body, "def ${1:name}():\n       $0");
    }

    #[test]
    fn test_prepare_body_tab_style() {
        let def = SnippetDefinition::new("if", "if x:\n\t\tpass", "", "").unwrap();
        let body = def.prepare_body("\tfoo = ", &IndentStyle::tabs(4));
        assert_eq!(body, "if x:\n\t\t\tpass");
    }

    #[test]
    fn test_literal_tabs_option() {
        let def = SnippetDefinition::new("t", "a\n\tb", "", "t").unwrap();
        let body = def.prepare_body("  ", &IndentStyle::spaces(2));
        assert_eq!(body, "a\n  \tb");
    }

    #[test]
    fn test_scope_and_globals() {
        let mut globals = BTreeMap::new();
        globals.insert("NAME".to_string(), "value".to_string());
        let def = SnippetDefinition::new("x", "${NAME}", "", "")
            .unwrap()
            .with_scope("rust")
            .with_globals(globals);
        assert_eq!(def.scope(), "rust");
        assert_eq!(def.globals().get("NAME").map(String::as_str), Some("value"));
    }
}
