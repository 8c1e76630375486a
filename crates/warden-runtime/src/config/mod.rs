//! Configuration loading and validation for the Warden runtime.
//!
//! Supports YAML files discovered on a search path or loaded explicitly,
//! with `${VAR}` / `${VAR:-default}` environment expansion. The `toml-config`
//! and `yaml-config` cargo features gate alternate formats through `figment`;
//! the default path parses YAML directly.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{GlobalConfig, GovernorConfig, PolicyRuleConfig, WardenConfig};
pub use validation::validate_config;
