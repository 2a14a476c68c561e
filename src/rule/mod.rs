//! Rule documents
//!
//! A rule document is the parsed, immutable form of one administrator-supplied
//! routing policy. A change in configuration always produces a new document.

mod document;
mod error;

pub use document::{parse, RuleDocument, RuleScope};
pub use error::ParseError;
