//! Configuration schema for the Warden control plane.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! WardenConfig
//! ├── global: GlobalConfig           # log level/format, shutdown timeout
//! ├── governor: GovernorConfig       # resource limits + policy rule bootstrap
//! └── plugins: Map<String, Value>    # per-plugin config, keyed by plugin id
//! ```
//!
//! # Example Configuration (YAML)
//!
//! ```yaml
//! global:
//!   log_level: debug
//!
//! governor:
//!   total_cpu_millis: 8000
//!   total_memory_bytes: 4294967296
//!   max_concurrent: 4
//!   max_queue_depth: 64
//!   policy_rules:
//!     - kind: cpu-threshold
//!       id: cpu-guard
//!       priority: 10
//!       theta: 0.9
//!
//! plugins:
//!   sandbox: {}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_governor::ResourceLimits;

/// Root configuration structure for the Warden control plane.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    /// Global runtime settings.
    pub global: GlobalConfig,

    /// Resource limits and policy rule bootstrap for the governor.
    pub governor: GovernorConfig,

    /// Per-plugin configuration, keyed by plugin id. Handed to the loader
    /// as each plugin's injected [`PluginContext`](warden_core::PluginContext) config.
    #[serde(default)]
    pub plugins: HashMap<String, Value>,
}

/// Global settings applying to the runtime as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default log level: trace, debug, info, warn, error.
    pub log_level: String,

    /// Graceful shutdown timeout, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shutdown_timeout_secs: 30,
        }
    }
}

/// Resource limits and policy rule bootstrap for the governor subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Total CPU budget, in milliseconds, shared across active tokens.
    pub total_cpu_millis: u64,
    /// Total memory budget, in bytes, shared across active tokens.
    pub total_memory_bytes: u64,
    /// Maximum number of tasks the build queue may run concurrently.
    pub max_concurrent: usize,
    /// Maximum number of tasks the build queue may hold queued.
    pub max_queue_depth: usize,
    /// Policy rules to register with the policy engine at startup, in the
    /// order listed (ties within equal priority resolve by this order).
    pub policy_rules: Vec<PolicyRuleConfig>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            total_cpu_millis: 4000,
            total_memory_bytes: 1024 * 1024 * 1024,
            max_concurrent: 4,
            max_queue_depth: 64,
            policy_rules: Vec::new(),
        }
    }
}

impl GovernorConfig {
    /// Projects the limits fields into [`ResourceLimits`].
    pub fn to_resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            total_cpu_millis: self.total_cpu_millis,
            total_memory_bytes: self.total_memory_bytes,
            max_concurrent: self.max_concurrent,
            max_queue_depth: self.max_queue_depth,
        }
    }
}

/// A declarative policy rule to register at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PolicyRuleConfig {
    /// Denies requests once CPU utilization meets or exceeds `theta`.
    CpuThreshold {
        id: String,
        priority: i32,
        theta: f64,
    },
    /// Denies requests once memory utilization meets or exceeds `theta`.
    MemoryThreshold {
        id: String,
        priority: i32,
        theta: f64,
    },
    /// Denies requests once the queue holds `max_depth` or more tasks.
    QueueDepthRule {
        id: String,
        priority: i32,
        max_depth: usize,
    },
    /// Throttles low-priority requests once average load meets `load_threshold`.
    PriorityThrottle {
        id: String,
        priority: i32,
        min_priority: u8,
        load_threshold: f64,
    },
}
