#![warn(missing_docs)]
//! Snippet Core - Headless Snippet Expansion Engine
//!
//! # Overview
//!
//! `snippet-core` expands tab-triggered code snippets inside a host editor and keeps them
//! navigable while the user edits freely. It owns no text: the host exposes its buffer through
//! [`TextBuffer`] and notifies the engine on cursor movement; the engine infers what changed
//! and keeps every tabstop, mirror and nested snippet aligned with the buffer.
//!
//! # Core Features
//!
//! - **Trigger Matching**: plain, word-boundary, in-word, line-start and regex triggers
//! - **Templates**: tabstops, nested defaults, mirrors, regex transformations, `${VISUAL}`
//! - **Edit Reconciliation**: a cursor-history guesser with an LCS diff fallback
//! - **Tabstop Tree**: arena of snippet nodes with interval-style position updates
//! - **Nested Expansion**: snippets expanded inside a tabstop of another snippet
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  SnippetManager (expand / jump / moved)     │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Providers, Choice Prompt, Outcome Sink     │  ← Host Collaborators
//! ├─────────────────────────────────────────────┤
//! │  Guesser + Diff  →  EditScript              │  ← Change Inference
//! ├─────────────────────────────────────────────┤
//! │  SnippetTree (arena of tabstops/mirrors)    │  ← Live Structure
//! ├─────────────────────────────────────────────┤
//! │  Template + Trigger + Transformation        │  ← Definitions
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use snippet_core::{
//!     Outcome, Position, ReconcileOutcome, RopeBuffer, SnippetDefinition, SnippetManager,
//!     TextBuffer,
//! };
//!
//! let mut manager = SnippetManager::default();
//! manager.add_snippet(
//!     SnippetDefinition::new("tag", "<${1:div}>$0</$1>", "html tag", "").unwrap(),
//! );
//!
//! let mut buffer = RopeBuffer::new("tag");
//! buffer.set_cursor(Position::new(0, 3));
//! assert_eq!(manager.expand(&mut buffer), Outcome::Expanded);
//! assert_eq!(buffer.text(), "<div></div>");
//!
//! // Overtype the selected tabstop; the closing tag follows.
//! buffer.type_text("p").unwrap();
//! assert!(matches!(
//!     manager.cursor_moved(&mut buffer),
//!     ReconcileOutcome::Replayed { .. }
//! ));
//! assert_eq!(buffer.text(), "<p></p>");
//! ```
//!
//! # Module Description
//!
//! - [`manager`] - Orchestrator and its configuration
//! - [`trigger`] / [`definition`] - Trigger options and snippet definitions
//! - [`template`] / [`transform`] - Body parsing, rendering and mirror transformations
//! - [`edit`] / [`diff`] / [`guess`] - Edit scripts and how they are inferred
//! - [`tree`] - The tabstop tree
//! - [`buffer`] / [`tracker`] - Host buffer access and cursor history

pub mod buffer;
pub mod definition;
pub mod diff;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod guess;
pub mod indent;
pub mod manager;
pub mod provider;
pub mod template;
pub mod tracker;
pub mod transform;
pub mod tree;
pub mod trigger;

pub use buffer::{RopeBuffer, TextBuffer};
pub use definition::{DEFAULT_SCOPE, SnippetDefinition};
pub use diff::diff;
pub use edit::{EditAtom, EditOp, EditScript};
pub use error::{ReplayError, SnippetError, TemplateError};
pub use geometry::{Position, Span};
pub use guess::guess_edit;
pub use indent::IndentStyle;
pub use manager::{ManagerConfig, ReconcileOutcome, SnippetManager};
pub use provider::{
    ChoicePrompt, FirstChoice, LogSink, Outcome, OutcomeSink, SnippetMatch, SnippetProvider,
    SnippetStore,
};
pub use template::{Piece, Rendered, Template};
pub use tracker::{CursorSnapshot, EditTracker, VisualContent, VisualMode};
pub use transform::Transformation;
pub use tree::{NodeId, NodeSnapshot, SnapshotKind, SnippetTree};
pub use trigger::{Trigger, TriggerMatch, TriggerOptions};
