//! The chain adapter contract and its registry.
//!
//! Concrete chain-protocol adapters are external collaborators — plugins
//! conforming to this interface — and are out of scope here. This module
//! defines only the contract and the `(family, network)`-keyed registry
//! the core consumes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// The connection state of a chain adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterStatus {
    /// Not connected and not attempting to connect.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and usable.
    Connected,
    /// The last connection attempt or operation failed.
    Error,
}

/// The outcome of a chain query. Unreachable nodes are reported as a
/// structured failure rather than by propagating an error, so callers can
/// distinguish transport failure (which `connect` may still raise) from a
/// node-level query failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainQueryResult {
    /// Whether the query succeeded.
    pub success: bool,
    /// The result payload, present on success.
    pub result: Option<serde_json::Value>,
    /// A diagnostic message, present on failure.
    pub error: Option<String>,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
}

/// The outcome of an adapter health check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Whether the adapter reports itself healthy.
    pub healthy: bool,
    /// Observed latency in milliseconds.
    pub latency_ms: u64,
}

/// The contract a chain-protocol adapter implements.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The adapter family this instance belongs to (e.g. `"evm"`, `"cosmos"`).
    fn family(&self) -> &str;

    /// The current connection status.
    fn status(&self) -> AdapterStatus;

    /// Connects using the given configuration fragment. May raise on
    /// transport-level failure.
    async fn connect(&self, config: serde_json::Value) -> AdapterResult<()>;

    /// Disconnects, if currently connected.
    async fn disconnect(&self);

    /// Returns adapter/network metadata.
    async fn get_info(&self) -> AdapterResult<serde_json::Value>;

    /// Issues a method query against the connected network.
    async fn query(&self, method: &str, params: serde_json::Value) -> ChainQueryResult;

    /// Checks adapter health.
    async fn health_check(&self) -> HealthCheckResult;
}

/// Indexes chain adapters by `(family, network_id)`, refusing duplicate
/// instances for the same pair.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<(String, String), Arc<dyn ChainAdapter>>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter for `(family, network_id)`. Fails if that pair
    /// is already occupied.
    pub fn register(
        &self,
        network_id: impl Into<String>,
        adapter: Arc<dyn ChainAdapter>,
    ) -> AdapterResult<()> {
        let network = network_id.into();
        let family = adapter.family().to_string();
        let mut adapters = self.adapters.write();
        let key = (family.clone(), network.clone());
        if adapters.contains_key(&key) {
            return Err(AdapterError::DuplicateAdapter { family, network });
        }
        adapters.insert(key, adapter);
        Ok(())
    }

    /// Looks up the adapter registered for `(family, network_id)`.
    pub fn get(&self, family: &str, network_id: &str) -> AdapterResult<Arc<dyn ChainAdapter>> {
        self.adapters
            .read()
            .get(&(family.to_string(), network_id.to_string()))
            .cloned()
            .ok_or_else(|| AdapterError::NotFound {
                family: family.to_string(),
                network: network_id.to_string(),
            })
    }

    /// Disconnects every registered adapter.
    pub async fn disconnect_all(&self) {
        let adapters: Vec<Arc<dyn ChainAdapter>> = self.adapters.read().values().cloned().collect();
        for adapter in adapters {
            adapter.disconnect().await;
        }
    }

    /// Returns the number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    /// Returns whether the registry holds no adapters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct StubAdapter {
        family: String,
        disconnected: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl ChainAdapter for StubAdapter {
        fn family(&self) -> &str {
            &self.family
        }

        fn status(&self) -> AdapterStatus {
            AdapterStatus::Connected
        }

        async fn connect(&self, _config: serde_json::Value) -> AdapterResult<()> {
            Ok(())
        }

        async fn disconnect(&self) {
            *self.disconnected.lock().await = true;
        }

        async fn get_info(&self) -> AdapterResult<serde_json::Value> {
            Ok(serde_json::json!({"family": self.family}))
        }

        async fn query(&self, _method: &str, _params: serde_json::Value) -> ChainQueryResult {
            ChainQueryResult {
                success: true,
                result: Some(serde_json::json!(null)),
                error: None,
                latency_ms: 1,
            }
        }

        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                healthy: true,
                latency_ms: 1,
            }
        }
    }

    #[test]
    fn duplicate_family_network_pair_is_rejected() {
        let registry = AdapterRegistry::new();
        let adapter = Arc::new(StubAdapter {
            family: "evm".to_string(),
            disconnected: Arc::new(Mutex::new(false)),
        });
        registry.register("mainnet", adapter.clone()).unwrap();
        let err = registry.register("mainnet", adapter);
        assert!(matches!(err, Err(AdapterError::DuplicateAdapter { .. })));
    }

    #[test]
    fn same_family_different_network_is_allowed() {
        let registry = AdapterRegistry::new();
        let a = Arc::new(StubAdapter {
            family: "evm".to_string(),
            disconnected: Arc::new(Mutex::new(false)),
        });
        let b = Arc::new(StubAdapter {
            family: "evm".to_string(),
            disconnected: Arc::new(Mutex::new(false)),
        });
        registry.register("mainnet", a).unwrap();
        registry.register("testnet", b).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn disconnect_all_touches_every_adapter() {
        let registry = AdapterRegistry::new();
        let flag = Arc::new(Mutex::new(false));
        let adapter = Arc::new(StubAdapter {
            family: "evm".to_string(),
            disconnected: flag.clone(),
        });
        registry.register("mainnet", adapter).unwrap();
        registry.disconnect_all().await;
        assert!(*flag.lock().await);
    }

    #[test]
    fn not_found_for_unregistered_pair() {
        let registry = AdapterRegistry::new();
        let err = registry.get("evm", "mainnet");
        assert!(matches!(err, Err(AdapterError::NotFound { .. })));
    }
}
