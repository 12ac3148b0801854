//! Effective configuration: file, then env overrides, then CLI flags.

use std::path::Path;

use tracing::debug;

use logtail_core::config::LogtailConfig;

use crate::cli::{Cli, DEFAULT_CONFIG_PATH};
use crate::error::CliError;

/// Placeholder printed instead of secrets.
const REDACTED: &str = "***REDACTED***";

/// Load the configuration and apply CLI overrides on top.
///
/// The default path may be missing (defaults are used); an explicitly given
/// path must exist. Validation runs once, on the merged result, so a flag can
/// replace a bad file value.
pub async fn load(cli: &Cli) -> Result<LogtailConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => LogtailConfig::resolve(path, true).await?,
        None => LogtailConfig::resolve(Path::new(DEFAULT_CONFIG_PATH), false).await?,
    };

    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

/// Overwrite configuration values with the flags that were given.
pub fn apply_cli_overrides(config: &mut LogtailConfig, cli: &Cli) {
    if let Some(level) = cli.verbosity_level() {
        config.general.log_level = level.to_owned();
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format.as_str().to_owned();
    }
    if cli.no_color {
        config.general.color = false;
    }

    if let Some(url) = &cli.url {
        config.search.url = url.clone();
    }
    if let Some(pattern) = &cli.index_pattern {
        config.search.index_pattern = pattern.clone();
    }
    if let Some(user) = &cli.user {
        config.search.user = user.clone();
    }
    if cli.trace_requests {
        config.search.trace_requests = true;
    }

    if !cli.terms.is_empty() {
        config.query.terms = cli.terms.clone();
    }
    if let Some(field) = &cli.timestamp_field {
        config.query.timestamp_field = field.clone();
    }
    if let Some(after) = &cli.after {
        config.query.after = after.clone();
    }
    if let Some(before) = &cli.before {
        config.query.before = before.clone();
    }
    if let Some(format) = &cli.format {
        config.query.format = format.clone();
    }

    if let Some(n) = cli.initial_entries {
        config.tail.initial_entries = n;
    }
    if cli.list_only {
        config.tail.follow = false;
    }

    if let Some(ssh) = &cli.ssh {
        config.tunnel.ssh = ssh.clone();
    }

    debug!("cli overrides applied");
}

/// Serialize the configuration as TOML with the password redacted.
pub fn redacted_toml(config: &LogtailConfig) -> Result<String, CliError> {
    let mut shown = config.clone();
    if !shown.search.password.is_empty() {
        shown.search.password = REDACTED.to_owned();
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| CliError::Config(format!("failed to serialize configuration: {e}")))
}
