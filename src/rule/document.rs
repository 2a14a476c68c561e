//! Rule document model and YAML parser

use super::ParseError;
use serde::{Deserialize, Serialize};

/// Which configuration scope a rule was published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Application,
    Service,
}

/// Wire shape of a rule document.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRule {
    scope: Option<RuleScope>,
    key: Option<String>,
    enabled: bool,
    force: bool,
    runtime: bool,
    priority: i32,
    conditions: Vec<String>,
}

impl Default for RawRule {
    fn default() -> Self {
        Self {
            scope: None,
            key: None,
            enabled: true,
            force: false,
            runtime: false,
            priority: 0,
            conditions: Vec::new(),
        }
    }
}

/// One immutable version of a routing rule.
///
/// `valid` is false when the document is absent, has no conditions, or is
/// disabled. An invalid document means "no filtering".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDocument {
    conditions: Vec<String>,
    force: bool,
    runtime: bool,
    valid: bool,
    enabled: bool,
    priority: i32,
    scope: Option<RuleScope>,
    key: Option<String>,
}

impl RuleDocument {
    /// Build a document from its routing-relevant fields.
    pub fn new(conditions: Vec<String>, force: bool, runtime: bool) -> Self {
        let valid = !conditions.is_empty();
        Self {
            conditions,
            force,
            runtime,
            valid,
            enabled: true,
            priority: 0,
            scope: None,
            key: None,
        }
    }

    /// The document installed when no rule text exists.
    pub fn absent() -> Self {
        Self::new(Vec::new(), false, false)
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn runtime(&self) -> bool {
        self.runtime
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn scope(&self) -> Option<RuleScope> {
        self.scope
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl From<RawRule> for RuleDocument {
    fn from(raw: RawRule) -> Self {
        let conditions: Vec<String> = raw
            .conditions
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        let valid = raw.enabled && !conditions.is_empty();
        Self {
            conditions,
            force: raw.force,
            runtime: raw.runtime,
            valid,
            enabled: raw.enabled,
            priority: raw.priority,
            scope: raw.scope,
            key: raw.key,
        }
    }
}

/// Parse raw rule text.
///
/// Missing or blank text yields an invalid (absent) document rather than an
/// error; only text that is present but malformed fails.
pub fn parse(raw: Option<&str>) -> Result<RuleDocument, ParseError> {
    let text = match raw {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Ok(RuleDocument::absent()),
    };

    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    let found = match &value {
        serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Null => Some("null"),
        serde_yaml::Value::Bool(_) => Some("boolean"),
        serde_yaml::Value::Number(_) => Some("number"),
        serde_yaml::Value::String(_) => Some("string"),
        serde_yaml::Value::Sequence(_) => Some("sequence"),
        serde_yaml::Value::Tagged(_) => Some("tagged value"),
    };
    if let Some(found) = found {
        return Err(ParseError::NotAMapping { found });
    }

    let raw: RawRule = serde_yaml::from_value(value)?;
    Ok(raw.into())
}
