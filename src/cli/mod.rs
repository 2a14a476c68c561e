//! CLI module for condgate
//!
//! # Commands
//!
//! - `check` - Parse and compile a rule file
//! - `route` - Evaluate a rule for one call against an endpoint list
//! - `watch` - Follow a rule source and log every reload
//! - `config` - Configuration utilities (init)
//!
//! # Example
//!
//! ```bash
//! condgate check rules/demo.condition-router.yaml
//! condgate route --rule rules/demo.condition-router.yaml \
//!     --endpoints endpoints.toml --attr region=hangzhou
//! condgate watch -c condgate.toml
//! ```

pub mod check;
pub mod config;
pub mod endpoints;
pub mod output;
pub mod route;
pub mod watch;

pub use check::handle_check;
pub use config::handle_config_init;
pub use route::handle_route;
pub use watch::run_watch;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// condgate - hot-reloadable condition routing
#[derive(Parser, Debug)]
#[command(
    name = "condgate",
    version,
    about = "Configuration-driven condition routing for service calls"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse and compile a rule file
    Check(CheckArgs),
    /// Evaluate a rule for one call
    Route(RouteArgs),
    /// Follow the configured rule source and log reloads
    Watch(WatchArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Rule document (YAML)
    pub rule: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Rule document (YAML)
    #[arg(short, long)]
    pub rule: PathBuf,

    /// Endpoint list (TOML, `[[endpoints]]` tables)
    #[arg(short, long)]
    pub endpoints: PathBuf,

    /// Invoked method name
    #[arg(short, long)]
    pub method: Option<String>,

    /// Call argument, repeat for each position
    #[arg(long = "arg")]
    pub arguments: Vec<String>,

    /// Caller attribute as key=value, repeatable
    #[arg(long = "attr", value_parser = parse_key_value)]
    pub attributes: Vec<(String, String)>,

    /// Caller host
    #[arg(long)]
    pub caller_host: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "condgate.toml")]
    pub config: PathBuf,

    /// Endpoint list to route after every reload
    #[arg(short, long)]
    pub endpoints: Option<PathBuf>,

    /// Override the application whose rule is followed
    #[arg(short, long, env = "CONDGATE_APPLICATION")]
    pub application: Option<String>,

    /// Override the rules directory
    #[arg(short = 'd', long, env = "CONDGATE_RULES_DIR")]
    pub rules_dir: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CONDGATE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "condgate.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,

    /// Application whose rule the config follows
    #[arg(short, long)]
    pub application: Option<String>,

    /// Directory holding `<application>.condition-router.yaml`
    #[arg(short = 'd', long)]
    pub rules_dir: Option<PathBuf>,

    /// Also create the rules directory
    #[arg(long)]
    pub create_rules_dir: bool,
}

/// Parse a `key=value` pair.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}
