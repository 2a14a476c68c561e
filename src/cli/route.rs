//! Route command implementation

use crate::chain::RouterChain;
use crate::cli::endpoints::load_endpoints;
use crate::cli::output::{format_route_json, format_route_table, EndpointView, RouteMode, RouteView};
use crate::cli::RouteArgs;
use crate::condition::ClauseCompiler;
use crate::endpoint::RequestContext;
use crate::routing::ConditionRouter;
use std::sync::Arc;

/// Build the call context described by the flags.
pub fn request_context(args: &RouteArgs) -> RequestContext {
    let mut context = RequestContext::new();
    if let Some(host) = &args.caller_host {
        context = context.with_host(host);
    }
    if let Some(method) = &args.method {
        context = context.with_method(method);
    }
    for argument in &args.arguments {
        context = context.with_argument(argument);
    }
    for (key, value) in &args.attributes {
        context = context.with_attribute(key, value);
    }
    context
}

/// Handle `condgate route`
pub fn handle_route(args: &RouteArgs) -> Result<String, Box<dyn std::error::Error>> {
    let rule = std::fs::read_to_string(&args.rule)
        .map_err(|e| format!("Failed to read rule {}: {}", args.rule.display(), e))?;
    let endpoints = load_endpoints(&args.endpoints)?;
    let candidates = endpoints.len();

    let key = args
        .rule
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rule".to_string());
    let router = Arc::new(ConditionRouter::new(key, Some(&rule), Arc::new(ClauseCompiler))?);

    let context = request_context(args);
    let snapshot = router.snapshot();
    let mode = if !snapshot.document().is_valid() {
        RouteMode::PassThrough
    } else if snapshot.is_runtime() {
        RouteMode::PerCall
    } else {
        RouteMode::Precomputed
    };

    let chain = RouterChain::new(router.clone(), endpoints, context.clone());
    let kept = chain.route(&context)?;

    let view = RouteView {
        key: router.key().to_string(),
        version: snapshot.version(),
        installed_at: snapshot.installed_at(),
        mode,
        force: snapshot.is_force(),
        candidates,
        endpoints: kept.iter().map(|e| EndpointView::from(e.as_ref())).collect(),
    };

    if args.json {
        Ok(format_route_json(&view)?)
    } else {
        Ok(format_route_table(&view))
    }
}
