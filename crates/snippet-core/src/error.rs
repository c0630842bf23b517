use thiserror::Error;

use crate::geometry::Position;

#[derive(Debug, Error)]
/// Errors produced while expanding, reconciling, or navigating snippets.
pub enum SnippetError {
    #[error("invalid regex trigger '{trigger}': {source}")]
    /// A `r` trigger failed to compile.
    InvalidTriggerRegex {
        /// The trigger text.
        trigger: String,
        /// The compiler error.
        source: regex::Error,
    },

    #[error("template error: {0}")]
    /// The snippet body could not be parsed.
    Template(#[from] TemplateError),

    #[error("replay error: {0}")]
    /// An edit operation could not be resolved against the tabstop tree.
    Replay(#[from] ReplayError),

    #[error("buffer error: {0}")]
    /// The host buffer rejected an operation.
    Buffer(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors produced by the template parser.
pub enum TemplateError {
    #[error("unterminated placeholder starting at character {0}")]
    /// A `${` was never closed.
    Unterminated(usize),

    #[error("malformed transformation at character {0}")]
    /// A `${N/...}` did not have the `regex/format/flags` shape.
    MalformedTransformation(usize),

    #[error("regex compile error for pattern '{pattern}': {message}")]
    /// A transformation regex failed to compile.
    RegexCompile {
        /// The regex pattern string.
        pattern: String,
        /// The compiler error message.
        message: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// A reconciliation step could not be mapped onto the tree.
///
/// These never reach the host: the replay pass is dropped and the tree is left as it was.
pub enum ReplayError {
    #[error("no node {0} in the snippet tree")]
    /// The node id does not refer to a live node.
    MissingNode(usize),

    #[error("edit at {0} lies outside the remembered text")]
    /// An operation referenced a line or column that does not exist.
    OutOfRange(Position),

    #[error("deleted text does not match the buffer at {0}")]
    /// The text an operation claims to delete is not what the snapshot holds.
    Mismatch(Position),
}
