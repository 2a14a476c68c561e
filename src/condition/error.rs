//! Error types for condition clauses

use thiserror::Error;

/// A clause could not be compiled into a matcher
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Empty condition clause")]
    Empty,

    /// Separator that the grammar does not know, or one in the wrong place
    #[error("Illegal route rule \"{clause}\": unexpected '{separator}' before \"{content}\"")]
    IllegalSeparator {
        clause: String,
        separator: String,
        content: String,
    },

    /// A separator with no value after it
    #[error("Illegal route rule \"{clause}\": dangling '{separator}'")]
    DanglingValue { clause: String, separator: String },

    #[error("Illegal route rule \"{clause}\": invalid argument key '{key}'")]
    InvalidArgumentIndex { clause: String, key: String },

    #[error("Illegal route rule \"{clause}\": bad pattern '{pattern}': {source}")]
    Glob {
        clause: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// A matcher failed while filtering a pool
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MatchError {
    pub message: String,
}

impl MatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
