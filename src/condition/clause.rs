//! `when => then` condition clauses

use super::pattern::{ConditionPart, ConditionSet};
use super::{CompileError, ConditionMatcher, MatchError};
use crate::endpoint::{Endpoint, RequestContext};
use std::sync::Arc;

/// A compiled `when => then` clause.
#[derive(Debug, Clone)]
pub struct ConditionClause {
    source: String,
    force: bool,
    /// Empty means "every call"
    when: ConditionSet,
    /// `None` blacklists matching calls
    then: Option<ConditionSet>,
}

impl ConditionClause {
    /// Compile a clause. `force` controls what happens when the then-part
    /// keeps nothing: `true` returns the empty pool, `false` returns the input.
    pub fn compile(clause: &str, force: bool) -> Result<Self, CompileError> {
        let source = clause.trim();
        if source.is_empty() {
            return Err(CompileError::Empty);
        }

        let rule = source.replace("consumer.", "").replace("provider.", "");
        let (when_text, then_text) = match rule.find("=>") {
            Some(i) => (rule[..i].trim(), rule[i + 2..].trim()),
            None => ("", rule.trim()),
        };

        let when = if when_text.is_empty() || when_text == "true" {
            ConditionSet::default()
        } else {
            ConditionSet::parse(when_text, ConditionPart::When, source)?
        };
        let then = if then_text.is_empty() || then_text == "false" {
            None
        } else {
            Some(ConditionSet::parse(then_text, ConditionPart::Then, source)?)
        };

        Ok(Self {
            source: source.to_string(),
            force,
            when,
            then,
        })
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// True when the when-part is empty or `true`.
    pub fn matches_every_call(&self) -> bool {
        self.when.is_empty()
    }

    /// True when matching calls get no endpoints at all.
    pub fn is_blacklist(&self) -> bool {
        self.then.is_none()
    }

    /// Whether the when-part selects this call.
    pub fn matches_when(&self, context: &RequestContext) -> bool {
        self.when.is_empty() || self.when.matches(|key| context.lookup(key), None)
    }

    fn matches_then(&self, endpoint: &Endpoint, context: &RequestContext) -> bool {
        match &self.then {
            Some(then) => then.matches(|key| endpoint.lookup(key), Some(context)),
            None => false,
        }
    }
}

impl ConditionMatcher for ConditionClause {
    fn source(&self) -> &str {
        &self.source
    }

    fn apply(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, MatchError> {
        if pool.is_empty() || !self.matches_when(context) {
            return Ok(pool.to_vec());
        }
        if self.then.is_none() {
            tracing::warn!(
                clause = %self.source,
                "Caller is blacklisted by condition clause"
            );
            return Ok(Vec::new());
        }

        let kept: Vec<Arc<Endpoint>> = pool
            .iter()
            .filter(|endpoint| self.matches_then(endpoint, context))
            .cloned()
            .collect();

        if !kept.is_empty() || self.force {
            if kept.is_empty() {
                tracing::warn!(
                    clause = %self.source,
                    "Forced condition clause matched no endpoints"
                );
            }
            return Ok(kept);
        }

        tracing::debug!(
            clause = %self.source,
            candidates = pool.len(),
            "Condition clause matched no endpoints, keeping input"
        );
        Ok(pool.to_vec())
    }
}
