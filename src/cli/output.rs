//! Output formatting helpers for CLI commands

use crate::condition::{ConditionClause, ConditionMatcher};
use crate::endpoint::Endpoint;
use crate::rule::{RuleDocument, RuleScope};
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;
use std::collections::BTreeMap;

/// View model for one compiled clause
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClauseView {
    pub index: usize,
    pub clause: String,
    pub every_call: bool,
    pub blacklist: bool,
}

impl ClauseView {
    pub fn new(index: usize, clause: &ConditionClause) -> Self {
        Self {
            index,
            clause: clause.source().to_string(),
            every_call: clause.matches_every_call(),
            blacklist: clause.is_blacklist(),
        }
    }
}

/// View model for a checked rule document
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleView {
    pub key: Option<String>,
    pub scope: Option<RuleScope>,
    pub valid: bool,
    pub enabled: bool,
    pub force: bool,
    pub runtime: bool,
    pub priority: i32,
    pub clauses: Vec<ClauseView>,
}

impl RuleView {
    pub fn new(document: &RuleDocument, clauses: Vec<ClauseView>) -> Self {
        Self {
            key: document.key().map(str::to_string),
            scope: document.scope(),
            valid: document.is_valid(),
            enabled: document.enabled(),
            force: document.force(),
            runtime: document.runtime(),
            priority: document.priority(),
            clauses,
        }
    }
}

/// View model for endpoint display
#[derive(Debug, Clone, serde::Serialize)]
pub struct EndpointView {
    pub id: String,
    pub address: String,
    pub attributes: BTreeMap<String, String>,
}

impl From<&Endpoint> for EndpointView {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            id: endpoint.id.clone(),
            address: endpoint.address(),
            attributes: endpoint.attributes.clone(),
        }
    }
}

/// How a routing result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// No valid rule, pool returned unfiltered
    PassThrough,
    Precomputed,
    PerCall,
}

impl RouteMode {
    fn label(self) -> &'static str {
        match self {
            RouteMode::PassThrough => "pass-through",
            RouteMode::Precomputed => "precomputed",
            RouteMode::PerCall => "per-call",
        }
    }
}

/// View model for a routing result
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouteView {
    pub key: String,
    pub version: u64,
    pub installed_at: DateTime<Utc>,
    pub mode: RouteMode,
    pub force: bool,
    pub candidates: usize,
    pub endpoints: Vec<EndpointView>,
}

fn flag(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

fn format_attributes(attributes: &BTreeMap<String, String>) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a checked rule as a summary line plus a clause table
pub fn format_rule_table(rule: &RuleView) -> String {
    let status = if rule.valid {
        "valid".green().to_string()
    } else {
        "inactive (no filtering)".yellow().to_string()
    };
    let summary = format!(
        "Rule: {}  enabled: {}  force: {}  runtime: {}  priority: {}",
        status,
        flag(rule.enabled),
        flag(rule.force),
        flag(rule.runtime),
        rule.priority
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Clause", "Every call", "Action"]);

    for c in &rule.clauses {
        let action = if c.blacklist {
            "blacklist".red().to_string()
        } else {
            "filter".cyan().to_string()
        };
        table.add_row(vec![
            Cell::new(c.index),
            Cell::new(&c.clause),
            Cell::new(flag(c.every_call)),
            Cell::new(action),
        ]);
    }

    format!("{}\n{}", summary, table)
}

/// Format a checked rule as JSON
pub fn format_rule_json(rule: &RuleView) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "rule": rule }))
}

/// Format a routing result as a summary line plus an endpoint table
pub fn format_route_table(route: &RouteView) -> String {
    let summary = format!(
        "{} v{} (installed {})  mode: {}  force: {}  kept {}/{}",
        route.key,
        route.version,
        route.installed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        route.mode.label(),
        flag(route.force),
        route.endpoints.len(),
        route.candidates
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Endpoint", "Address", "Attributes"]);

    for e in &route.endpoints {
        table.add_row(vec![
            Cell::new(&e.id),
            Cell::new(&e.address),
            Cell::new(format_attributes(&e.attributes)),
        ]);
    }

    format!("{}\n{}", summary, table)
}

/// Format a routing result as JSON
pub fn format_route_json(route: &RouteView) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "route": route }))
}
