//! Snippet body templates.
//!
//! A body is parsed into [`Piece`]s, numbered placeholders are resolved into tabstops and
//! mirrors, and the result is rendered into plain text plus a flat list of positioned nodes
//! that the tabstop tree is built from.
//!
//! Supported syntax:
//!
//! - `$N`, `${N}`, `${N:default}` (defaults may nest further placeholders)
//! - `${N/regex/format/flags}` transforming mirrors
//! - `${VISUAL}` / `${VISUAL:default}` for the preserved visual selection
//! - `${MATCHn}` for capture group `n` of a regex trigger
//! - `${NAME}` / `${NAME:default}` for the definition's globals
//! - `\` escapes `$ { } \ ` /` and the backtick

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::TemplateError;
use crate::geometry::{Position, Span};
use crate::indent::leading_whitespace;
use crate::transform::Transformation;
use crate::trigger::TriggerMatch;

/// A parsed element of a snippet body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text.
    Text(String),
    /// A navigable tabstop with its default content.
    Tabstop {
        /// Tabstop number (`0` is the exit stop).
        number: usize,
        /// Default content.
        children: Vec<Piece>,
    },
    /// A region that always shows the (optionally transformed) text of a tabstop.
    Mirror {
        /// The mirrored tabstop number.
        number: usize,
        /// Optional transformation applied to the tabstop text.
        transform: Option<Transformation>,
    },
    /// The preserved visual selection, or `default` when there is none.
    Visual {
        /// Fallback text.
        default: String,
    },
    /// A named value (`MATCHn` or a global), or `default` when it is unknown.
    Variable {
        /// Variable name.
        name: String,
        /// Fallback text.
        default: String,
    },
}

/// A parsed and resolved snippet body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

/// Raw parse output before tabstop/mirror resolution.
#[derive(Debug, Clone)]
enum RawPiece {
    Text(String),
    Placeholder {
        number: usize,
        braced: bool,
        children: Vec<RawPiece>,
    },
    Transform {
        number: usize,
        transform: Transformation,
    },
    Visual(String),
    Variable(String, String),
}

const ESCAPABLE: &[char] = &['$', '{', '}', '\\', '`', '/'];

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Parse until end of input, or until the `}` closing a placeholder opened at `open`.
    fn parse_sequence(&mut self, open: Option<usize>) -> Result<Vec<RawPiece>, TemplateError> {
        let mut pieces = Vec::new();
        loop {
            let Some(ch) = self.peek() else {
                return match open {
                    Some(at) => Err(TemplateError::Unterminated(at)),
                    None => Ok(pieces),
                };
            };

            match ch {
                '}' if open.is_some() => {
                    self.pos += 1;
                    return Ok(pieces);
                }
                '\\' => {
                    match self.peek_at(1) {
                        Some(next) if ESCAPABLE.contains(&next) => {
                            push_text(&mut pieces, next);
                            self.pos += 2;
                        }
                        _ => {
                            push_text(&mut pieces, '\\');
                            self.pos += 1;
                        }
                    }
                }
                '$' => match self.parse_dollar()? {
                    Some(piece) => pieces.push(piece),
                    None => {
                        push_text(&mut pieces, '$');
                        self.pos += 1;
                    }
                },
                _ => {
                    push_text(&mut pieces, ch);
                    self.pos += 1;
                }
            }
        }
    }

    /// Parse a `$...` construct at the cursor. Returns `None` (cursor untouched) for a literal `$`.
    fn parse_dollar(&mut self) -> Result<Option<RawPiece>, TemplateError> {
        let open = self.pos;
        match self.peek_at(1) {
            Some(c) if c.is_ascii_digit() => {
                self.pos += 1;
                let number = self.take_number();
                Ok(Some(RawPiece::Placeholder {
                    number,
                    braced: false,
                    children: Vec::new(),
                }))
            }
            Some('{') => {
                let after_brace = self.pos + 2;
                match self.chars.get(after_brace) {
                    Some(c) if c.is_ascii_digit() => {
                        self.pos = after_brace;
                        let number = self.take_number();
                        self.parse_numbered(number, open).map(Some)
                    }
                    Some(c) if c.is_alphabetic() || *c == '_' => {
                        self.pos = after_brace;
                        let name = self.take_identifier();
                        match self.peek() {
                            Some('}') => {
                                self.pos += 1;
                                Ok(Some(named_piece(name, String::new())))
                            }
                            Some(':') => {
                                self.pos += 1;
                                let default = flatten(&self.parse_sequence(Some(open))?);
                                Ok(Some(named_piece(name, default)))
                            }
                            _ => {
                                self.pos = open;
                                Ok(None)
                            }
                        }
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_numbered(&mut self, number: usize, open: usize) -> Result<RawPiece, TemplateError> {
        match self.peek() {
            Some('}') => {
                self.pos += 1;
                Ok(RawPiece::Placeholder {
                    number,
                    braced: true,
                    children: Vec::new(),
                })
            }
            Some(':') => {
                self.pos += 1;
                let children = self.parse_sequence(Some(open))?;
                Ok(RawPiece::Placeholder {
                    number,
                    braced: true,
                    children,
                })
            }
            Some('/') => {
                self.pos += 1;
                let pattern = self
                    .take_until_unescaped('/', true)
                    .ok_or(TemplateError::MalformedTransformation(open))?;
                let format = self
                    .take_until_unescaped('/', false)
                    .ok_or(TemplateError::MalformedTransformation(open))?;
                let flags = self
                    .take_until_unescaped('}', false)
                    .ok_or(TemplateError::MalformedTransformation(open))?;
                let transform = Transformation::new(&pattern, &format, &flags)?;
                Ok(RawPiece::Transform { number, transform })
            }
            None => Err(TemplateError::Unterminated(open)),
            Some(_) => Err(TemplateError::MalformedTransformation(open)),
        }
    }

    fn take_number(&mut self) -> usize {
        let mut number = 0usize;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            number = number.saturating_mul(10).saturating_add(d as usize);
            self.pos += 1;
        }
        number
    }

    fn take_identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    /// Consume up to and including `stop`. `\stop` yields `stop`; for regex parts other
    /// escapes are kept intact so the regex sees them.
    fn take_until_unescaped(&mut self, stop: char, keep_escapes: bool) -> Option<String> {
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            if c == stop {
                return Some(out);
            }
            if c == '\\' {
                let next = self.peek()?;
                self.pos += 1;
                if next == stop {
                    out.push(next);
                } else if keep_escapes || next != '\\' {
                    out.push('\\');
                    out.push(next);
                } else {
                    out.push_str("\\\\");
                }
                continue;
            }
            out.push(c);
        }
    }
}

fn push_text(pieces: &mut Vec<RawPiece>, ch: char) {
    if let Some(RawPiece::Text(text)) = pieces.last_mut() {
        text.push(ch);
    } else {
        pieces.push(RawPiece::Text(ch.to_string()));
    }
}

fn named_piece(name: String, default: String) -> RawPiece {
    if name == "VISUAL" {
        RawPiece::Visual(default)
    } else {
        RawPiece::Variable(name, default)
    }
}

fn flatten(pieces: &[RawPiece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            RawPiece::Text(text) => out.push_str(text),
            RawPiece::Placeholder { children, .. } => out.push_str(&flatten(children)),
            RawPiece::Visual(default) | RawPiece::Variable(_, default) => out.push_str(default),
            RawPiece::Transform { .. } => {}
        }
    }
    out
}

impl Template {
    /// Parse a (already re-indented) snippet body.
    pub fn parse(body: &str) -> Result<Self, TemplateError> {
        let raw = Parser::new(body).parse_sequence(None)?;

        // The first braced placeholder owns its number; without one, the first bare `$N` does.
        let mut owners: HashMap<usize, (bool, usize)> = HashMap::new();
        let mut counter = 0usize;
        collect_owners(&raw, &mut owners, &mut counter);

        let mut counter = 0usize;
        let pieces = resolve(raw, &owners, &mut counter);
        Ok(Self { pieces })
    }

    /// The resolved pieces.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Tabstop numbers present in the template, ascending.
    pub fn tabstop_numbers(&self) -> Vec<usize> {
        let mut numbers = Vec::new();
        collect_numbers(&self.pieces, &mut numbers);
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    /// Render the template starting at `start`.
    ///
    /// `first_line_prefix` is the buffer text preceding `start` on its line; it decides the
    /// indentation continuation lines of `${VISUAL}` receive on the first line.
    pub fn render(&self, start: Position, first_line_prefix: &str, ctx: &RenderContext<'_>) -> Rendered {
        let mut defaults = BTreeMap::new();
        let mut owners = HashMap::new();
        index_tabstops(&self.pieces, &mut owners);
        for number in owners.keys() {
            let mut visiting = HashSet::new();
            let text = tabstop_text(*number, &owners, ctx, &mut visiting);
            defaults.insert(*number, text);
        }

        let mut emitter = Emitter {
            text: String::new(),
            pos: start,
            first_line_prefix,
            nodes: Vec::new(),
            defaults: &defaults,
            ctx,
        };
        emitter.emit(&self.pieces, None);

        if !owners.contains_key(&0) {
            emitter.nodes.push(RenderedNode {
                kind: RenderedKind::Tabstop(0),
                span: Span::empty_at(emitter.pos),
                parent: None,
            });
        }

        Rendered {
            span: Span::new(start, emitter.pos),
            text: emitter.text,
            nodes: emitter.nodes,
        }
    }
}

fn collect_owners(pieces: &[RawPiece], owners: &mut HashMap<usize, (bool, usize)>, counter: &mut usize) {
    for piece in pieces {
        if let RawPiece::Placeholder {
            number,
            braced,
            children,
        } = piece
        {
            let index = *counter;
            *counter += 1;
            match owners.get(number) {
                None => {
                    owners.insert(*number, (*braced, index));
                }
                Some((false, _)) if *braced => {
                    owners.insert(*number, (true, index));
                }
                _ => {}
            }
            collect_owners(children, owners, counter);
        }
    }
}

fn resolve(raw: Vec<RawPiece>, owners: &HashMap<usize, (bool, usize)>, counter: &mut usize) -> Vec<Piece> {
    let mut out = Vec::with_capacity(raw.len());
    for piece in raw {
        match piece {
            RawPiece::Text(text) => out.push(Piece::Text(text)),
            RawPiece::Placeholder {
                number, children, ..
            } => {
                let index = *counter;
                *counter += 1;
                let is_owner = owners.get(&number).is_some_and(|(_, owner)| *owner == index);
                // Children are resolved either way so the counter stays in pre-order.
                let children = resolve(children, owners, counter);
                if is_owner {
                    out.push(Piece::Tabstop { number, children });
                } else {
                    out.push(Piece::Mirror {
                        number,
                        transform: None,
                    });
                }
            }
            RawPiece::Transform { number, transform } => out.push(Piece::Mirror {
                number,
                transform: Some(transform),
            }),
            RawPiece::Visual(default) => out.push(Piece::Visual { default }),
            RawPiece::Variable(name, default) => out.push(Piece::Variable { name, default }),
        }
    }
    out
}

fn collect_numbers(pieces: &[Piece], numbers: &mut Vec<usize>) {
    for piece in pieces {
        if let Piece::Tabstop { number, children } = piece {
            numbers.push(*number);
            collect_numbers(children, numbers);
        }
    }
}

fn index_tabstops<'a>(pieces: &'a [Piece], owners: &mut HashMap<usize, &'a [Piece]>) {
    for piece in pieces {
        if let Piece::Tabstop { number, children } = piece {
            owners.entry(*number).or_insert(children.as_slice());
            index_tabstops(children, owners);
        }
    }
}

fn tabstop_text(
    number: usize,
    owners: &HashMap<usize, &[Piece]>,
    ctx: &RenderContext<'_>,
    visiting: &mut HashSet<usize>,
) -> String {
    let Some(children) = owners.get(&number) else {
        return String::new();
    };
    if !visiting.insert(number) {
        return String::new();
    }
    let mut out = String::new();
    for piece in children.iter() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Tabstop { number, .. } => {
                out.push_str(&tabstop_text(*number, owners, ctx, visiting))
            }
            Piece::Mirror { number, transform } => {
                let source = tabstop_text(*number, owners, ctx, visiting);
                match transform {
                    Some(t) => out.push_str(&t.apply(&source)),
                    None => out.push_str(&source),
                }
            }
            Piece::Visual { default } => out.push_str(ctx.visual.unwrap_or(default)),
            Piece::Variable { name, default } => out.push_str(&ctx.variable(name, default)),
        }
    }
    visiting.remove(&number);
    out
}

/// Values a template may reference while rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Preserved visual selection text, if any.
    pub visual: Option<&'a str>,
    /// The trigger match (regex captures for `${MATCHn}`).
    pub trigger_match: &'a TriggerMatch,
    /// The definition's globals.
    pub globals: &'a BTreeMap<String, String>,
}

impl RenderContext<'_> {
    fn variable(&self, name: &str, default: &str) -> String {
        if let Some(group) = name.strip_prefix("MATCH")
            && let Ok(index) = group.parse::<usize>()
        {
            return self
                .trigger_match
                .capture(index)
                .unwrap_or(default)
                .to_string();
        }
        self.globals
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Kind of a rendered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedKind {
    /// A tabstop.
    Tabstop(usize),
    /// A mirror of a tabstop.
    Mirror(usize, Option<Transformation>),
}

/// A positioned node produced by [`Template::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNode {
    /// What the node is.
    pub kind: RenderedKind,
    /// Where it ended up.
    pub span: Span,
    /// Index of the enclosing node in the same list, `None` for top-level nodes.
    pub parent: Option<usize>,
}

/// Output of [`Template::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The full expanded text.
    pub text: String,
    /// Span covered by `text`.
    pub span: Span,
    /// Nodes in pre-order (parents before children).
    pub nodes: Vec<RenderedNode>,
}

struct Emitter<'a, 'c> {
    text: String,
    pos: Position,
    first_line_prefix: &'a str,
    nodes: Vec<RenderedNode>,
    defaults: &'a BTreeMap<usize, String>,
    ctx: &'a RenderContext<'c>,
}

impl Emitter<'_, '_> {
    fn push(&mut self, text: &str) {
        self.text.push_str(text);
        self.pos = self.pos.advanced_by(text);
    }

    fn current_line_indent(&self) -> String {
        match self.text.rfind('\n') {
            Some(idx) => leading_whitespace(&self.text[idx + 1..]).to_string(),
            None => {
                let prefix_indent = leading_whitespace(self.first_line_prefix);
                if prefix_indent.len() == self.first_line_prefix.len() {
                    // Only whitespace precedes the snippet: its own leading whitespace counts too.
                    format!("{}{}", prefix_indent, leading_whitespace(&self.text))
                } else {
                    prefix_indent.to_string()
                }
            }
        }
    }

    fn emit(&mut self, pieces: &[Piece], parent: Option<usize>) {
        for piece in pieces {
            match piece {
                Piece::Text(text) => self.push(text),
                Piece::Tabstop { number, children } => {
                    let index = self.nodes.len();
                    let start = self.pos;
                    self.nodes.push(RenderedNode {
                        kind: RenderedKind::Tabstop(*number),
                        span: Span::empty_at(start),
                        parent,
                    });
                    self.emit(children, Some(index));
                    self.nodes[index].span = Span::new(start, self.pos);
                }
                Piece::Mirror { number, transform } => {
                    let source = self.defaults.get(number).cloned().unwrap_or_default();
                    let text = match transform {
                        Some(t) => t.apply(&source),
                        None => source,
                    };
                    let start = self.pos;
                    self.push(&text);
                    self.nodes.push(RenderedNode {
                        kind: RenderedKind::Mirror(*number, transform.clone()),
                        span: Span::new(start, self.pos),
                        parent,
                    });
                }
                Piece::Visual { default } => {
                    let text = match self.ctx.visual {
                        Some(visual) if !visual.is_empty() => {
                            let indent = self.current_line_indent();
                            indent_continuation_lines(visual, &indent)
                        }
                        _ => default.clone(),
                    };
                    self.push(&text);
                }
                Piece::Variable { name, default } => {
                    let text = self.ctx.variable(name, default);
                    self.push(&text);
                }
            }
        }
    }
}

fn indent_continuation_lines(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}
