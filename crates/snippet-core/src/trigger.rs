//! Trigger matching.
//!
//! Decides whether a snippet trigger matches the text immediately before the cursor, and which
//! part of that text the expansion consumes. All lengths are in characters.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::SnippetError;
use crate::geometry::{char_len, char_prefix, char_suffix_from};

/// Option flags attached to a snippet trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerOptions {
    /// `r`: the trigger is a regular expression that must match at the end of the line.
    pub regex: bool,
    /// `w`: the trigger must start on a word boundary.
    pub word: bool,
    /// `i`: the trigger may match inside a word.
    pub in_word: bool,
    /// `b`: only whitespace may precede the trigger on its line.
    pub line_start: bool,
    /// `!`: this definition replaces earlier ones with the same trigger.
    pub overwrite: bool,
    /// `t`: keep leading tabs of the body literally instead of re-indenting.
    pub literal_tabs: bool,
    /// `s`: strip whitespace before the cursor at end of line on the first jump.
    pub strip_trailing: bool,
}

impl TriggerOptions {
    /// Parse an option-letter string such as `"bw!"`. Unknown letters are ignored.
    pub fn parse(letters: &str) -> Self {
        let mut options = Self::default();
        for ch in letters.chars() {
            match ch {
                'r' => options.regex = true,
                'w' => options.word = true,
                'i' => options.in_word = true,
                'b' => options.line_start = true,
                '!' => options.overwrite = true,
                't' => options.literal_tabs = true,
                's' => options.strip_trailing = true,
                _ => {}
            }
        }
        options
    }
}

/// The result of a successful trigger match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerMatch {
    /// The trailing part of the text before the cursor that the expansion replaces.
    pub matched: String,
    /// Regex capture groups (`captures[0]` is the whole match). Empty for non-regex triggers.
    pub captures: Vec<Option<String>>,
}

impl TriggerMatch {
    fn literal(matched: impl Into<String>) -> Self {
        Self {
            matched: matched.into(),
            captures: Vec::new(),
        }
    }

    /// Capture group `index` of a regex trigger match.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).and_then(|c| c.as_deref())
    }
}

/// A trigger together with its options and (for `r`) the compiled pattern.
#[derive(Debug, Clone)]
pub struct Trigger {
    text: String,
    options: TriggerOptions,
    word_count: usize,
    pattern: Option<Regex>,
}

impl Trigger {
    /// Build a trigger. Regex triggers are compiled here, once.
    pub fn new(text: &str, options: TriggerOptions) -> Result<Self, SnippetError> {
        let pattern = if options.regex {
            Some(
                Regex::new(text).map_err(|source| SnippetError::InvalidTriggerRegex {
                    trigger: text.to_string(),
                    source,
                })?,
            )
        } else {
            None
        };

        Ok(Self {
            text: text.to_string(),
            options,
            word_count: text.split_whitespace().count(),
            pattern,
        })
    }

    /// The trigger text (or pattern).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The option flags.
    pub fn options(&self) -> TriggerOptions {
        self.options
    }

    /// Check whether the trigger matches the end of `before`.
    ///
    /// `w` takes precedence over `i`; `r` replaces both.
    pub fn matches(&self, before: &str) -> Option<TriggerMatch> {
        // Never expand right after whitespace.
        if !before.is_empty() && before.trim_end() != before {
            return None;
        }

        let words = words_for_line(before, self.word_count);

        let found = if self.options.regex {
            self.regex_match(before)
        } else if self.options.word {
            let trigger_len = char_len(&self.text);
            let split = char_len(words).saturating_sub(trigger_len);
            let prefix = char_prefix(words, split);
            let suffix = char_suffix_from(words, split);
            if suffix != self.text {
                None
            } else if has_word_boundary(prefix.chars().last(), suffix.chars().next()) {
                Some(TriggerMatch::literal(self.text.as_str()))
            } else {
                None
            }
        } else if self.options.in_word {
            words
                .ends_with(self.text.as_str())
                .then(|| TriggerMatch::literal(self.text.as_str()))
        } else {
            (words == self.text).then(|| TriggerMatch::literal(self.text.as_str()))
        };

        found.filter(|m| self.line_start_ok(before, m))
    }

    /// Check whether the trigger could still match once the user finishes typing it.
    ///
    /// Used for completion listings. In `w` mode a candidate is dropped when the trailing text
    /// had to be trimmed to a word boundary, so partial mid-word triggers are never offered.
    pub fn could_match(&self, before: &str) -> Option<TriggerMatch> {
        // After a space or tab, list everything.
        let before = if before.ends_with([' ', '\t']) {
            ""
        } else {
            before
        };
        if !before.is_empty() && before.trim_end() != before {
            return None;
        }

        let words = words_for_line(before, self.word_count);

        let found = if self.options.regex {
            self.regex_match(before)
        } else if self.options.word {
            let suffix = trim_to_last_word_boundary(words);
            if suffix == words && self.text.starts_with(suffix) {
                Some(TriggerMatch::literal(suffix))
            } else {
                None
            }
        } else {
            self.text
                .starts_with(words)
                .then(|| TriggerMatch::literal(words))
        };

        found.filter(|m| self.line_start_ok(before, m))
    }

    fn regex_match(&self, before: &str) -> Option<TriggerMatch> {
        let pattern = self.pattern.as_ref()?;
        pattern
            .captures_iter(before)
            .find(|caps| caps.get(0).is_some_and(|m| m.end() == before.len()))
            .map(|caps| TriggerMatch {
                matched: caps
                    .get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                captures: caps
                    .iter()
                    .map(|group| group.map(|g| g.as_str().to_string()))
                    .collect(),
            })
    }

    fn line_start_ok(&self, before: &str, found: &TriggerMatch) -> bool {
        if !self.options.line_start {
            return true;
        }
        let trimmed = before.trim_end();
        let keep = char_len(trimmed).saturating_sub(char_len(&found.matched));
        char_prefix(trimmed, keep)
            .trim_matches([' ', '\t'])
            .is_empty()
    }
}

/// Returns `true` for characters in the regex `\w` class (letters, marks, digits and
/// connector punctuation).
pub fn is_word_char(ch: char) -> bool {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();
    let mut utf8 = [0u8; 4];
    match WORD.get_or_init(|| Regex::new(r"^\w$").ok()) {
        Some(word) => word.is_match(ch.encode_utf8(&mut utf8)),
        None => ch == '_' || ch.is_alphanumeric(),
    }
}

fn has_word_boundary(left: Option<char>, right: Option<char>) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => is_word_char(l) != is_word_char(r),
        // Nothing precedes the trigger inside the word run.
        (None, _) => true,
        (Some(_), None) => false,
    }
}

/// The last `num_words` whitespace-separated words of `before`, trimmed.
fn words_for_line(before: &str, num_words: usize) -> &str {
    if before.is_empty() {
        return "";
    }

    let words: Vec<&str> = before.split_whitespace().collect();
    if words.len() <= num_words {
        return before.trim();
    }

    let mut cut = before.len();
    for word in words.iter().rev().take(num_words) {
        cut = before[..cut].rfind(word).unwrap_or(0);
    }
    before[cut..].trim()
}

/// Text after the last word boundary that still leaves at least one character on each side.
fn trim_to_last_word_boundary(words: &str) -> &str {
    let chars: Vec<(usize, char)> = words.char_indices().collect();
    for idx in (1..chars.len()).rev() {
        if is_word_char(chars[idx - 1].1) != is_word_char(chars[idx].1) {
            return &words[chars[idx].0..];
        }
    }
    words
}
