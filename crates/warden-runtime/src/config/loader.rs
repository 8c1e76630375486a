//! Configuration file loader.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::WardenConfig;
use super::validation::validate_config;

const CONFIG_NAMES: &[&str] = &["warden.yaml", "warden.yml", "config.yaml", "config.yml"];

/// Configuration loader with search-path discovery and environment expansion.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds `dirs::config_dir()/warden` to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(dir) = dirs::config_dir() {
            self.add_search_path(dir.join("warden"))
        } else {
            self
        }
    }

    /// Loads configuration from the first file found on the search path,
    /// falling back to defaults if none is found.
    pub fn load(&self) -> ConfigResult<WardenConfig> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }
        info!("no configuration file found, using defaults");
        Ok(WardenConfig::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<WardenConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Loads configuration from a YAML string, expanding `${VAR}` /
    /// `${VAR:-default}` references first.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<WardenConfig> {
        let expanded = expand_env_vars(yaml);
        let config: WardenConfig = serde_yaml::from_str(&expanded)?;
        validate_config(&config)?;
        debug!(plugins = config.plugins.len(), "configuration loaded");
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                if path.exists() {
                    info!(path = %path.display(), "found configuration file");
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands `${VAR}` and `${VAR:-default}` references in `content`.
fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}").unwrap();
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = cap.get(0).unwrap().as_str();
        let var_name = cap.get(1).unwrap().as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();

        result = result.replace(full_match, &value);
    }

    result
}

/// Loads configuration with default search paths (current dir, user config dir).
pub fn load_config() -> ConfigResult<WardenConfig> {
    ConfigLoader::default().load()
}

/// Loads configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<WardenConfig> {
    ConfigLoader::new().load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let loader = ConfigLoader::new();
        let config = loader.load_from_str("").unwrap();
        assert_eq!(config.global.log_level, "info");
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn parses_governor_and_plugin_sections() {
        let yaml = r#"
governor:
  total_cpu_millis: 8000
  max_concurrent: 2
  policy_rules:
    - kind: cpu-threshold
      id: cpu-guard
      priority: 10
      theta: 0.9

plugins:
  sandbox: {}
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.governor.total_cpu_millis, 8000);
        assert_eq!(config.governor.max_concurrent, 2);
        assert_eq!(config.governor.policy_rules.len(), 1);
        assert!(config.plugins.contains_key("sandbox"));
    }

    #[test]
    fn env_var_expansion_with_default() {
        let yaml = r#"
global:
  log_level: "${NONEXISTENT_WARDEN_LOG_LEVEL:-debug}"
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.global.log_level, "debug");
    }

    #[test]
    fn missing_file_is_reported() {
        let loader = ConfigLoader::new();
        let err = loader.load_from_file("/nonexistent/warden.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
