//! Condition matchers
//!
//! Every clause of a rule document is compiled into a [`ConditionMatcher`]:
//! a capability that filters an ordered endpoint pool for one call. The
//! routing pipeline only sees this trait, so clause implementations can be
//! swapped or instrumented without touching routing.

mod clause;
mod error;
mod pattern;

pub use clause::ConditionClause;
pub use error::{CompileError, MatchError};

use crate::endpoint::{Endpoint, RequestContext};
use std::fmt;
use std::sync::Arc;

/// A compiled clause.
pub trait ConditionMatcher: Send + Sync + fmt::Debug {
    /// Raw clause text this matcher was compiled from.
    fn source(&self) -> &str;

    /// Filter `pool` for the call described by `context`.
    ///
    /// Implementations must preserve order and only return elements of
    /// `pool`.
    fn apply(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, MatchError>;
}

/// Turns raw clause text into matchers.
pub trait ConditionCompiler: Send + Sync {
    fn compile(
        &self,
        clause: &str,
        force: bool,
    ) -> Result<Box<dyn ConditionMatcher>, CompileError>;
}

/// Compiler for the `when => then` grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseCompiler;

impl ConditionCompiler for ClauseCompiler {
    fn compile(
        &self,
        clause: &str,
        force: bool,
    ) -> Result<Box<dyn ConditionMatcher>, CompileError> {
        Ok(Box::new(ConditionClause::compile(clause, force)?))
    }
}
