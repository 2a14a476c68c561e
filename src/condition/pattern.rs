//! Condition grammar: tokenizer, value patterns and match pairs

use super::CompileError;
use crate::endpoint::{argument_index, RequestContext};
use globset::{GlobBuilder, GlobMatcher};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Which side of `=>` a condition set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConditionPart {
    /// Matched against the calling context
    When,
    /// Matched against each endpoint; may reference the context with `$key`
    Then,
}

/// One compiled value of a `key=value` pair.
#[derive(Debug, Clone)]
pub(crate) enum ValuePattern {
    Any,
    Exact(String),
    Glob(GlobMatcher),
    /// `$key`: compare against the calling context's value for `key`
    Reference(String),
}

impl ValuePattern {
    fn compile(value: &str, part: ConditionPart, clause: &str) -> Result<Self, CompileError> {
        if value == "*" {
            return Ok(ValuePattern::Any);
        }
        if part == ConditionPart::Then {
            if let Some(reference) = value.strip_prefix('$') {
                return Ok(ValuePattern::Reference(reference.to_string()));
            }
        }
        if value.contains('*') {
            let glob = GlobBuilder::new(&star_only_glob(value))
                .backslash_escape(true)
                .build()
                .map_err(|source| CompileError::Glob {
                    clause: clause.to_string(),
                    pattern: value.to_string(),
                    source,
                })?;
            return Ok(ValuePattern::Glob(glob.compile_matcher()));
        }
        Ok(ValuePattern::Exact(value.to_string()))
    }

    fn is_match(&self, value: &str, context: Option<&RequestContext>) -> bool {
        match self {
            ValuePattern::Any => true,
            ValuePattern::Exact(expected) => expected == value,
            ValuePattern::Glob(glob) => glob.is_match(value),
            ValuePattern::Reference(key) => match context {
                Some(ctx) => ctx.lookup(key).is_some_and(|v| v == value),
                None => false,
            },
        }
    }
}

/// Glob text in which `*` is the only wildcard. Other glob metacharacters
/// are escaped and runs of `*` collapse into one.
fn star_only_glob(value: &str) -> String {
    let mut glob = String::with_capacity(value.len() * 2);
    let mut previous = None;
    for c in value.chars() {
        match c {
            '*' if previous == Some('*') => continue,
            '?' | '[' | ']' | '{' | '}' | '\\' => {
                glob.push('\\');
                glob.push(c);
            }
            _ => glob.push(c),
        }
        previous = Some(c);
    }
    glob
}

/// Match and mismatch values collected for one key.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchPair {
    matches: Vec<ValuePattern>,
    mismatches: Vec<ValuePattern>,
}

impl MatchPair {
    /// Mismatches are checked first; an empty pair never matches.
    fn is_match(&self, value: &str, context: Option<&RequestContext>) -> bool {
        if self
            .mismatches
            .iter()
            .any(|p| p.is_match(value, context))
        {
            return false;
        }
        if !self.matches.is_empty() {
            return self.matches.iter().any(|p| p.is_match(value, context));
        }
        !self.mismatches.is_empty()
    }
}

/// Conjunction of `key` → pair conditions.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConditionSet {
    pairs: BTreeMap<String, MatchPair>,
}

impl ConditionSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Evaluate against a sample. A key missing from the sample fails when it
    /// carries match values and passes otherwise. An empty set never matches.
    pub(crate) fn matches<'a, F>(&self, lookup: F, context: Option<&RequestContext>) -> bool
    where
        F: Fn(&str) -> Option<Cow<'a, str>>,
    {
        let mut result = false;
        for (key, pair) in &self.pairs {
            match lookup(key) {
                Some(value) => {
                    if !pair.is_match(&value, context) {
                        return false;
                    }
                }
                None => {
                    if !pair.matches.is_empty() {
                        return false;
                    }
                }
            }
            result = true;
        }
        result
    }

    /// Parse one side of a clause: `key=v1,v2 & other!=v3`.
    pub(crate) fn parse(
        text: &str,
        part: ConditionPart,
        clause: &str,
    ) -> Result<Self, CompileError> {
        let mut set = ConditionSet::default();
        let mut key: Option<String> = None;
        // Which value list of the current key the last value went into
        let mut negated: Option<bool> = None;

        let mut chars = text.chars().peekable();
        loop {
            let mut separator = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    chars.next();
                } else if is_separator(c) {
                    separator.push(c);
                    chars.next();
                } else {
                    break;
                }
            }

            let mut content = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || is_separator(c) {
                    break;
                }
                content.push(c);
                chars.next();
            }

            if content.is_empty() {
                if separator.is_empty() {
                    break;
                }
                return Err(CompileError::DanglingValue {
                    clause: clause.to_string(),
                    separator,
                });
            }

            let illegal = |separator: &str, content: &str| CompileError::IllegalSeparator {
                clause: clause.to_string(),
                separator: separator.to_string(),
                content: content.to_string(),
            };

            match separator.as_str() {
                "" | "&" => {
                    if content.starts_with("arguments[") && argument_index(&content).is_none() {
                        return Err(CompileError::InvalidArgumentIndex {
                            clause: clause.to_string(),
                            key: content,
                        });
                    }
                    set.pairs.entry(content.clone()).or_default();
                    key = Some(content);
                    negated = None;
                }
                "=" | "!=" => {
                    let Some(current) = key.as_ref() else {
                        return Err(illegal(&separator, &content));
                    };
                    let pattern = ValuePattern::compile(&content, part, clause)?;
                    let pair = set.pairs.entry(current.clone()).or_default();
                    let is_negated = separator == "!=";
                    if is_negated {
                        pair.mismatches.push(pattern);
                    } else {
                        pair.matches.push(pattern);
                    }
                    negated = Some(is_negated);
                }
                "," => {
                    let (Some(current), Some(is_negated)) = (key.as_ref(), negated) else {
                        return Err(illegal(&separator, &content));
                    };
                    let pattern = ValuePattern::compile(&content, part, clause)?;
                    let pair = set.pairs.entry(current.clone()).or_default();
                    if is_negated {
                        pair.mismatches.push(pattern);
                    } else {
                        pair.matches.push(pattern);
                    }
                }
                _ => return Err(illegal(&separator, &content)),
            }
        }

        Ok(set)
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '&' | '!' | '=' | ',')
}
