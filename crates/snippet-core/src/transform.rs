//! Regex transformations for transforming mirrors (`${1/regex/format/flags}`).
//!
//! The format string supports:
//!
//! - `$n` and `${n}` for capture groups
//! - `(?n:then:else)` conditionals on whether group `n` participated
//! - `\u`, `\l` (next char) and `\U`, `\L` ... `\E` (run) case folding
//! - `\n`, `\t`, and `\x` for any other literal `x`

use regex::{Captures, Regex, RegexBuilder};

use crate::error::TemplateError;

/// A compiled transformation.
#[derive(Debug, Clone)]
pub struct Transformation {
    regex: Regex,
    format: Vec<char>,
    global: bool,
}

impl PartialEq for Transformation {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
            && self.format == other.format
            && self.global == other.global
    }
}

impl Eq for Transformation {}

impl Transformation {
    /// Compile a transformation from its three parts.
    pub fn new(pattern: &str, format: &str, flags: &str) -> Result<Self, TemplateError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .build()
            .map_err(|err| TemplateError::RegexCompile {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            regex,
            format: format.chars().collect(),
            global: flags.contains('g'),
        })
    }

    /// Apply the transformation to `text`. Unmatched text passes through unchanged.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            let mut case = CaseState::default();
            expand(&self.format, &caps, &mut case, &mut out);
            last = whole.end();
            if !self.global {
                break;
            }
        }
        out.push_str(&text[last..]);
        out
    }
}

#[derive(Debug, Default)]
struct CaseState {
    one_shot: Option<bool>,
    run: Option<bool>,
}

impl CaseState {
    fn push(&mut self, out: &mut String, text: &str) {
        for ch in text.chars() {
            let upper = self.one_shot.take().or(self.run);
            match upper {
                Some(true) => out.extend(ch.to_uppercase()),
                Some(false) => out.extend(ch.to_lowercase()),
                None => out.push(ch),
            }
        }
    }
}

fn expand(format: &[char], caps: &Captures<'_>, case: &mut CaseState, out: &mut String) {
    let mut i = 0;
    while i < format.len() {
        let ch = format[i];
        match ch {
            '\\' if i + 1 < format.len() => {
                let next = format[i + 1];
                i += 2;
                match next {
                    'u' => case.one_shot = Some(true),
                    'l' => case.one_shot = Some(false),
                    'U' => case.run = Some(true),
                    'L' => case.run = Some(false),
                    'E' => case.run = None,
                    'n' => case.push(out, "\n"),
                    't' => case.push(out, "\t"),
                    other => case.push(out, &other.to_string()),
                }
            }
            '$' => {
                if let Some((group, consumed)) = parse_group_ref(&format[i + 1..]) {
                    let value = caps.get(group).map(|m| m.as_str()).unwrap_or("");
                    case.push(out, value);
                    i += 1 + consumed;
                } else {
                    case.push(out, "$");
                    i += 1;
                }
            }
            '(' if format.get(i + 1) == Some(&'?') => {
                match parse_conditional(format, i) {
                    Some(cond) => {
                        let branch = if caps.get(cond.group).is_some() {
                            &format[cond.then_range.0..cond.then_range.1]
                        } else {
                            &format[cond.else_range.0..cond.else_range.1]
                        };
                        expand(branch, caps, case, out);
                        i = cond.next;
                    }
                    None => {
                        case.push(out, "(");
                        i += 1;
                    }
                }
            }
            _ => {
                case.push(out, &ch.to_string());
                i += 1;
            }
        }
    }
}

/// Parse `n` or `{n}` after a `$`; returns the group and the number of chars consumed.
fn parse_group_ref(rest: &[char]) -> Option<(usize, usize)> {
    if rest.first() == Some(&'{') {
        let digits = rest[1..].iter().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 || rest.get(1 + digits) != Some(&'}') {
            return None;
        }
        let group = rest[1..1 + digits].iter().collect::<String>().parse().ok()?;
        return Some((group, digits + 2));
    }
    let digits = rest.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let group = rest[..digits].iter().collect::<String>().parse().ok()?;
    Some((group, digits))
}

struct Conditional {
    group: usize,
    then_range: (usize, usize),
    else_range: (usize, usize),
    next: usize,
}

/// Parse `(?n:then:else)` starting at `open`, where `format[open] == '('`.
fn parse_conditional(format: &[char], open: usize) -> Option<Conditional> {
    let digits_start = open + 2;
    let digits = format[digits_start..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 || format.get(digits_start + digits) != Some(&':') {
        return None;
    }
    let group = format[digits_start..digits_start + digits]
        .iter()
        .collect::<String>()
        .parse()
        .ok()?;

    let then_start = digits_start + digits + 1;
    let mut depth = 0usize;
    let mut split = None;
    let mut i = then_start;
    while i < format.len() {
        match format[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ':' if depth == 0 && split.is_none() => split = Some(i),
            ')' if depth == 0 => {
                let (then_range, else_range) = match split {
                    Some(s) => ((then_start, s), (s + 1, i)),
                    None => ((then_start, i), (i, i)),
                };
                return Some(Conditional {
                    group,
                    then_range,
                    else_range,
                    next: i + 1,
                });
            }
            ')' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}
