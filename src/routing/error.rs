//! Error types for rule installation and routing

use crate::condition::{CompileError, MatchError};
use crate::rule::ParseError;
use crate::source::SourceError;
use thiserror::Error;

/// Errors that stop a rule version from being installed
#[derive(Debug, Error)]
pub enum RouterError {
    /// The configuration source could not deliver rule text
    #[error("Configuration source failed: {0}")]
    Source(#[from] SourceError),

    /// Rule text is malformed
    #[error("Rule rejected: {0}")]
    Parse(#[from] ParseError),

    /// One of the rule's clauses does not compile
    #[error("Rule rejected: {0}")]
    Compile(#[from] CompileError),
}

/// Errors that fail a single routed call
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A clause failed while filtering; only this call is affected
    #[error("Condition clause \"{clause}\" failed: {source}")]
    Matcher {
        clause: String,
        #[source]
        source: MatchError,
    },

    /// Force mode is on and no endpoint survived the rule
    #[error("No endpoint satisfies forced routing rule '{key}'")]
    ForcedEmpty { key: String },
}
