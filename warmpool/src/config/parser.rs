//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to settings and
//! pool policies.

use ini::{Ini, Properties};

use super::duration::parse_duration;
use super::file::{ConfigFile, ConfigFileError, POOL_SECTION_PREFIX};
use crate::pool::{PoolKind, PoolPolicy};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
/// Pools are returned in file order.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [registry] section
    if let Some(section) = ini.section(Some("registry")) {
        if let Some(v) = section.get("sweep_interval") {
            let interval = duration_value("registry", "sweep_interval", v)?;
            if interval.is_zero() {
                return Err(invalid("registry", "sweep_interval", v, "must be greater than zero"));
            }
            config.registry.sweep_interval = interval;
        }
        if let Some(v) = section.get("fetch_timeout") {
            let v = v.trim();
            config.registry.fetch_timeout = match v.to_lowercase().as_str() {
                "" | "none" | "off" => None,
                _ => {
                    let timeout = duration_value("registry", "fetch_timeout", v)?;
                    (!timeout.is_zero()).then_some(timeout)
                }
            };
        }
        if let Some(v) = section.get("event_buffer") {
            config.registry.event_buffer = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("registry", "event_buffer", v, "must be a positive integer"))?;
        }
    }

    // [pool.<key>] sections
    for (name, section) in ini.iter() {
        let Some(key) = name.and_then(|n| n.strip_prefix(POOL_SECTION_PREFIX)) else {
            continue;
        };
        let policy = parse_pool(name.unwrap_or_default(), key.trim(), section)?;
        config.pools.push(policy);
    }

    Ok(config)
}

fn parse_pool(
    section_name: &str,
    key: &str,
    section: &Properties,
) -> Result<PoolPolicy, ConfigFileError> {
    let kind_value = section
        .get("kind")
        .ok_or_else(|| invalid(section_name, "kind", "", "is required"))?;
    let kind: PoolKind = kind_value.parse().map_err(|_| {
        invalid(
            section_name,
            "kind",
            kind_value,
            "must be one of: native, interstitial, rewarded",
        )
    })?;

    let mut policy = PoolPolicy::new(key, kind);

    if let Some(v) = section.get("unit_id") {
        let v = v.trim();
        if !v.is_empty() {
            policy = policy.with_unit_id(v);
        }
    }
    if let Some(v) = section.get("capacity") {
        let capacity = v.trim().parse().ok().filter(|n: &usize| *n >= 1).ok_or_else(|| {
            invalid(section_name, "capacity", v, "must be an integer of at least 1")
        })?;
        policy = policy.with_capacity(capacity);
    }
    if let Some(v) = section.get("failure_threshold") {
        let threshold = v.trim().parse().ok().filter(|n: &u32| *n >= 1).ok_or_else(|| {
            invalid(section_name, "failure_threshold", v, "must be an integer of at least 1")
        })?;
        policy = policy.with_failure_threshold(threshold);
    }
    if let Some(v) = section.get("cooldown") {
        policy = policy.with_cooldown(duration_value(section_name, "cooldown", v)?);
    }
    if let Some(v) = section.get("stale_age") {
        let stale_age = duration_value(section_name, "stale_age", v)?;
        if stale_age.is_zero() {
            return Err(invalid(section_name, "stale_age", v, "must be greater than zero"));
        }
        policy = policy.with_stale_age(stale_age);
    }

    policy.validate().map_err(|e| invalid(section_name, "name", key, &e.to_string()))?;
    Ok(policy)
}

fn duration_value(
    section: &str,
    key: &str,
    value: &str,
) -> Result<std::time::Duration, ConfigFileError> {
    parse_duration(value).map_err(|_| {
        invalid(
            section,
            key,
            value,
            "expected a duration like '30', '30s', '500ms', '5m' or '1h'",
        )
    })
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
