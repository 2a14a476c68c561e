//! Error types for rule document parsing

use thiserror::Error;

/// Errors raised while turning raw rule text into a [`RuleDocument`](super::RuleDocument)
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not valid YAML or a field has the wrong type
    #[error("Malformed rule document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The YAML root is a scalar or sequence
    #[error("Rule document must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
}
