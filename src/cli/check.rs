//! Check command implementation

use crate::cli::output::{format_rule_json, format_rule_table, ClauseView, RuleView};
use crate::cli::CheckArgs;
use crate::condition::ConditionClause;

/// Handle `condgate check`. Every clause is compiled, including those of a
/// disabled rule, so syntax errors surface before the rule is enabled.
pub fn handle_check(args: &CheckArgs) -> Result<String, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&args.rule)
        .map_err(|e| format!("Failed to read rule {}: {}", args.rule.display(), e))?;
    let document = crate::rule::parse(Some(&content))?;

    let mut clauses = Vec::with_capacity(document.conditions().len());
    for (index, condition) in document.conditions().iter().enumerate() {
        let clause = ConditionClause::compile(condition, document.force())
            .map_err(|e| format!("Clause {}: {}", index, e))?;
        clauses.push(ClauseView::new(index, &clause));
    }

    let view = RuleView::new(&document, clauses);
    if args.json {
        Ok(format_rule_json(&view)?)
    } else {
        Ok(format_rule_table(&view))
    }
}
