//! The fail-closed invariant engine.
//!
//! Predicates are registered once per run (no unregister) and evaluated as a
//! conjunction against a caller-supplied JSON context. Every check produces a
//! [`Verdict`] that is appended to an append-only audit log, never mutated
//! afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{InvariantError, InvariantResult};

/// A governance predicate, evaluated against an arbitrary JSON context.
///
/// Implementations should be pure with respect to the passed context: no
/// side effects, no dependence on anything the caller didn't hand in.
#[async_trait]
pub trait InvariantCheck: Send + Sync {
    /// Evaluates the predicate. Returning `Err` counts as a failed,
    /// fail-closed result — the same as returning `Ok(false)` — but the
    /// error text is preserved in the result for diagnostics.
    async fn check(&self, context: &serde_json::Value) -> Result<bool, String>;
}

/// Adapts a plain async closure into an [`InvariantCheck`].
pub struct FnInvariant<F>(pub F);

#[async_trait]
impl<F, Fut> InvariantCheck for FnInvariant<F>
where
    F: Fn(&serde_json::Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<bool, String>> + Send,
{
    async fn check(&self, context: &serde_json::Value) -> Result<bool, String> {
        (self.0)(context).await
    }
}

struct RegisteredInvariant {
    name: String,
    owner: String,
    description: String,
    check: Arc<dyn InvariantCheck>,
}

/// Static metadata about a registered invariant (read-only introspection).
#[derive(Debug, Clone)]
pub struct InvariantInfo {
    /// Unique invariant name.
    pub name: String,
    /// Plugin id that registered this invariant.
    pub owner: String,
    /// Human-readable description.
    pub description: String,
}

/// The outcome of evaluating a single invariant within a [`Verdict`].
#[derive(Debug, Clone)]
pub struct InvariantOutcome {
    /// The invariant's name.
    pub name: String,
    /// The plugin id that owns this invariant.
    pub owner: String,
    /// Whether the predicate passed.
    pub passed: bool,
    /// How long evaluation took.
    pub duration: Duration,
    /// The captured error, if the predicate raised instead of returning a bool.
    pub error: Option<String>,
}

/// The structured result of evaluating every registered invariant once.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Per-invariant outcomes, in registration order.
    pub results: Vec<InvariantOutcome>,
    /// True iff every result passed.
    pub allowed: bool,
    /// When this verdict was produced.
    pub timestamp: DateTime<Utc>,
}

/// Registry of governance predicates plus an append-only verdict audit.
#[derive(Default)]
pub struct InvariantEngine {
    invariants: RwLock<Vec<RegisteredInvariant>>,
    audit: RwLock<Vec<Verdict>>,
}

impl InvariantEngine {
    /// Creates a new, empty invariant engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new invariant. Fails loudly if `name` is already taken —
    /// there is no unregister, so names are unique for the run's lifetime.
    pub fn register(
        &self,
        name: impl Into<String>,
        owner: impl Into<String>,
        description: impl Into<String>,
        check: Arc<dyn InvariantCheck>,
    ) -> InvariantResult<()> {
        let name = name.into();
        let mut invariants = self.invariants.write();
        if invariants.iter().any(|i| i.name == name) {
            return Err(InvariantError::DuplicateName(name));
        }
        invariants.push(RegisteredInvariant {
            name,
            owner: owner.into(),
            description: description.into(),
            check,
        });
        Ok(())
    }

    /// Evaluates every registered invariant, in registration order, against
    /// `context`. All invariants run even after an early failure, so callers
    /// see the full violation set. The verdict is appended to the audit log
    /// and returned.
    pub async fn check(&self, context: &serde_json::Value) -> Verdict {
        let snapshot: Vec<(String, String, Arc<dyn InvariantCheck>)> = self
            .invariants
            .read()
            .iter()
            .map(|i| (i.name.clone(), i.owner.clone(), Arc::clone(&i.check)))
            .collect();

        let mut results = Vec::with_capacity(snapshot.len());
        for (name, owner, check) in snapshot {
            let start = Instant::now();
            let (passed, error) = match check.check(context).await {
                Ok(passed) => (passed, None),
                Err(e) => {
                    warn!(invariant = %name, error = %e, "invariant predicate raised");
                    (false, Some(e))
                }
            };
            let duration = start.elapsed();
            debug!(invariant = %name, passed, ?duration, "invariant evaluated");
            results.push(InvariantOutcome {
                name,
                owner,
                passed,
                duration,
                error,
            });
        }

        let allowed = results.iter().all(|r| r.passed);
        let verdict = Verdict {
            results,
            allowed,
            timestamp: Utc::now(),
        };

        self.audit.write().push(verdict.clone());
        verdict
    }

    /// Returns read-only metadata for every registered invariant.
    pub fn registered(&self) -> Vec<InvariantInfo> {
        self.invariants
            .read()
            .iter()
            .map(|i| InvariantInfo {
                name: i.name.clone(),
                owner: i.owner.clone(),
                description: i.description.clone(),
            })
            .collect()
    }

    /// Returns a snapshot of every verdict produced so far, in order.
    pub fn audit_log(&self) -> Vec<Verdict> {
        self.audit.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let engine = InvariantEngine::new();
        engine
            .register(
                "always-ok",
                "core",
                "never fails",
                Arc::new(FnInvariant(|_ctx: &serde_json::Value| async { Ok(true) })),
            )
            .unwrap();

        let err = engine.register(
            "always-ok",
            "other",
            "duplicate",
            Arc::new(FnInvariant(|_ctx: &serde_json::Value| async { Ok(true) })),
        );
        assert!(matches!(err, Err(InvariantError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn throwing_predicate_fails_closed() {
        let engine = InvariantEngine::new();
        engine
            .register(
                "boom",
                "core",
                "always raises",
                Arc::new(FnInvariant(|_ctx: &serde_json::Value| async {
                    Err("kaboom".to_string())
                })),
            )
            .unwrap();

        let verdict = engine.check(&serde_json::json!({})).await;
        assert!(!verdict.allowed);
        assert_eq!(verdict.results.len(), 1);
        assert_eq!(verdict.results[0].name, "boom");
        assert!(!verdict.results[0].passed);
        assert_eq!(verdict.results[0].error.as_deref(), Some("kaboom"));

        assert_eq!(engine.audit_log().len(), 1);
    }

    #[tokio::test]
    async fn allowed_iff_all_passed() {
        let engine = InvariantEngine::new();
        engine
            .register(
                "pass",
                "core",
                "",
                Arc::new(FnInvariant(|_ctx: &serde_json::Value| async { Ok(true) })),
            )
            .unwrap();
        engine
            .register(
                "fail",
                "core",
                "",
                Arc::new(FnInvariant(|_ctx: &serde_json::Value| async { Ok(false) })),
            )
            .unwrap();

        let verdict = engine.check(&serde_json::json!({})).await;
        assert!(!verdict.allowed);
        assert_eq!(verdict.results.len(), 2);
        assert_eq!(verdict.results[0].name, "pass");
        assert_eq!(verdict.results[1].name, "fail");
    }
}
