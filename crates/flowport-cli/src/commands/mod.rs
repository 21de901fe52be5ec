//! CLI command implementations

pub mod convert;
pub mod init;
pub mod plan;
pub mod validate;

use anyhow::{Context, Result};
use flowport_core::{Config, CyclePolicy};

/// Load the project configuration, defaulting when the file is absent
pub fn load_config(config_path: &str) -> Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))
}

/// Cycle policy after applying the `--fail-on-cycle` flag
pub fn cycle_policy(config: &Config, fail_on_cycle: bool) -> CyclePolicy {
    if fail_on_cycle {
        CyclePolicy::Fail
    } else {
        config.project.cycle_policy
    }
}
