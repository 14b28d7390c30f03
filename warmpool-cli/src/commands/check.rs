//! Check command - validate a pool config file and print what it declares.

use std::path::Path;

use warmpool::config::{format_duration, ConfigFile};

use crate::error::CliError;

/// Load the config at `path`, validate every pool and print a summary.
pub fn run(path: &Path) -> Result<(), CliError> {
    let config = load_pools(path)?;
    print!("{}", render(path, &config));
    Ok(())
}

/// Load a config file that must declare at least one valid pool.
pub fn load_pools(path: &Path) -> Result<ConfigFile, CliError> {
    let config = ConfigFile::load_from(path)?;
    if config.pools.is_empty() {
        return Err(CliError::NoPools(path.to_path_buf()));
    }
    for policy in &config.pools {
        policy.validate()?;
    }
    Ok(config)
}

fn render(path: &Path, config: &ConfigFile) -> String {
    let registry = &config.registry;
    let timeout = registry
        .fetch_timeout
        .map(format_duration)
        .unwrap_or_else(|| "none".to_string());

    let mut lines = vec![
        format!("Config: {}", path.display()),
        format!("  Sweep interval: {}", format_duration(registry.sweep_interval)),
        format!("  Fetch timeout:  {}", timeout),
        format!("  Event buffer:   {}", registry.event_buffer),
        String::new(),
        format!("Pools ({}):", config.pools.len()),
    ];

    for policy in &config.pools {
        lines.push(format!("  {}", policy));
        lines.push(format!(
            "    capacity={} failure_threshold={} cooldown={}",
            policy.capacity(),
            policy.failure_threshold(),
            format_duration(policy.cooldown()),
        ));
        if policy.kind().requires_expiry() {
            lines.push(format!("    stale_age={}", format_duration(policy.stale_age())));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
