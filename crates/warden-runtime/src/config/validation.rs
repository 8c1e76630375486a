//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::WardenConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &WardenConfig) -> ConfigResult<()> {
    validate_global(config)?;
    validate_governor(config)?;
    validate_plugin_ids(config)?;
    Ok(())
}

fn validate_global(config: &WardenConfig) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&config.global.log_level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "invalid log level: {}. valid values are: {VALID_LOG_LEVELS:?}",
            config.global.log_level
        )));
    }
    if config.global.shutdown_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "global.shutdown_timeout_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_governor(config: &WardenConfig) -> ConfigResult<()> {
    let governor = &config.governor;
    if governor.max_concurrent == 0 {
        return Err(ConfigError::validation(
            "governor.max_concurrent must be greater than 0",
        ));
    }

    let mut seen_ids = HashSet::new();
    for rule in &governor.policy_rules {
        let id = policy_rule_id(rule);
        if !seen_ids.insert(id.clone()) {
            return Err(ConfigError::validation(format!(
                "duplicate policy rule id: {id}"
            )));
        }
    }
    Ok(())
}

fn policy_rule_id(rule: &super::schema::PolicyRuleConfig) -> String {
    use super::schema::PolicyRuleConfig::*;
    match rule {
        CpuThreshold { id, .. }
        | MemoryThreshold { id, .. }
        | QueueDepthRule { id, .. }
        | PriorityThrottle { id, .. } => id.clone(),
    }
}

fn validate_plugin_ids(config: &WardenConfig) -> ConfigResult<()> {
    for id in config.plugins.keys() {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(ConfigError::InvalidPluginId(id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&WardenConfig::default()).is_ok());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = WardenConfig::default();
        config.global.log_level = "verbose".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn duplicate_policy_rule_id_is_rejected() {
        use super::super::schema::PolicyRuleConfig;
        let mut config = WardenConfig::default();
        config.governor.policy_rules = vec![
            PolicyRuleConfig::CpuThreshold {
                id: "guard".to_string(),
                priority: 10,
                theta: 0.9,
            },
            PolicyRuleConfig::QueueDepthRule {
                id: "guard".to_string(),
                priority: 5,
                max_depth: 10,
            },
        ];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn non_kebab_plugin_id_is_rejected() {
        let mut config = WardenConfig::default();
        config.plugins.insert("Sandbox".to_string(), serde_json::json!({}));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPluginId(_))
        ));
    }
}
