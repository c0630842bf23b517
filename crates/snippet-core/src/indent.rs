//! Indentation style used when re-indenting snippet bodies.

/// How the host buffer indents: tabs or spaces, and how wide a level is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentStyle {
    /// Indent with spaces instead of tab characters.
    pub expand_tab: bool,
    /// Width of one indentation level, in columns.
    pub shift_width: usize,
    /// Display width of a tab character.
    pub tab_width: usize,
}

impl Default for IndentStyle {
    fn default() -> Self {
        Self {
            expand_tab: false,
            shift_width: 4,
            tab_width: 4,
        }
    }
}

impl IndentStyle {
    /// Indent with `width` spaces per level.
    pub fn spaces(width: usize) -> Self {
        Self {
            expand_tab: true,
            shift_width: width,
            tab_width: width,
        }
    }

    /// Indent with tab characters of the given display width.
    pub fn tabs(width: usize) -> Self {
        Self {
            expand_tab: false,
            shift_width: width,
            tab_width: width,
        }
    }

    /// The indentation string for `levels` snippet-body tabs.
    pub fn indent_for_levels(&self, levels: usize) -> String {
        let columns = levels * self.shift_width;
        if self.expand_tab || self.tab_width == 0 {
            return " ".repeat(columns);
        }
        let mut out = "\t".repeat(columns / self.tab_width);
        out.push_str(&" ".repeat(columns % self.tab_width));
        out
    }
}

/// The leading run of spaces and tabs of `line`.
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, ch)| *ch != ' ' && *ch != '\t')
        .map(|(idx, _)| idx)
        .unwrap_or(line.len());
    &line[..end]
}
