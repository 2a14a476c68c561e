//! `condgate config init`
//!
//! Renders the starter configuration with the requested application and
//! rules directory, checks that the result loads and validates, and only then
//! writes it.

use crate::cli::ConfigInitArgs;
use crate::config::{CondgateConfig, ConfigError};
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../condgate.example.toml");

/// Starter config text plus the settings it parses to.
pub fn render_config(args: &ConfigInitArgs) -> Result<(String, CondgateConfig), ConfigError> {
    let mut text = EXAMPLE_CONFIG.to_string();
    if let Some(application) = &args.application {
        text = replace_setting(&text, "application", application);
    }
    if let Some(dir) = &args.rules_dir {
        text = replace_setting(&text, "dir", &dir.to_string_lossy());
    }

    let config: CondgateConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: args.output.clone(),
        source,
    })?;
    config.validate()?;
    Ok((text, config))
}

/// Replace the first `name = ...` line, quoting `value` as a TOML string.
fn replace_setting(text: &str, name: &str, value: &str) -> String {
    let prefix = format!("{} = ", name);
    let quoted = toml::Value::String(value.to_string()).to_string();
    let mut replaced = false;

    text.lines()
        .map(|line| {
            if !replaced && line.starts_with(&prefix) {
                replaced = true;
                format!("{}{}", prefix, quoted)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Handle `condgate config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(ConfigError::Exists(args.output.clone()).into());
    }

    let (text, config) = render_config(args)?;
    fs::write(&args.output, text).map_err(|source| ConfigError::Write {
        path: args.output.clone(),
        source,
    })?;

    if args.create_rules_dir {
        fs::create_dir_all(&config.source.dir).map_err(|source| ConfigError::Write {
            path: config.source.dir.clone(),
            source,
        })?;
    }

    let key = config.router.rule_key();
    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Rule key:  {}", key);
    println!(
        "  Rule file: {}",
        config.source.dir.join(format!("{}.yaml", key)).display()
    );
    println!("  Start following it with `condgate watch -c {}`.", args.output.display());

    Ok(())
}
