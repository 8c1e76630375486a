//! The priority build queue: submit, drain, cancel, clear.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditLog;
use crate::error::{GovernorError, GovernorResult};
use crate::token::TokenIssuer;

/// The lifecycle status of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting in the queue.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Removed before it could run.
    Cancelled,
}

/// A task managed by the build queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Unique task id.
    pub id: String,
    /// A human-readable label.
    pub label: String,
    /// The owner that submitted this task.
    pub owner: String,
    /// The token id this task is bound to.
    pub token_id: String,
    /// Priority, inherited from the bound token at submission time.
    pub priority: u8,
    /// Current status.
    pub status: TaskStatus,
    /// The task's opaque payload, handed to the executor.
    pub payload: Value,
    /// When the task was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// When the task began running, if it has.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// The executor's result, on `Completed`.
    pub result: Option<Value>,
    /// The captured error, on `Failed` or `Cancelled`.
    pub error: Option<String>,
}

/// A request to submit a new task.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// A human-readable label.
    pub label: String,
    /// The owner submitting this task.
    pub owner: String,
    /// The token id this task is bound to; must be active at submission time.
    pub token_id: String,
    /// The task's opaque payload.
    pub payload: Value,
}

/// Invoked once per task by [`BuildQueue::process_next`].
///
/// An `Err` return marks the task `failed` with the captured message; an
/// `Ok` return marks it `completed` with the carried result.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes `task` and returns its result or a captured failure message.
    async fn execute(&self, task: &QueuedTask) -> Result<Value, String>;
}

struct QueueState {
    queued: Vec<QueuedTask>,
    next_id: u64,
}

/// A priority queue of tasks bound to execution tokens, with a single
/// injected executor per governor instance.
pub struct BuildQueue {
    state: RwLock<QueueState>,
    active_count: AtomicUsize,
    max_concurrent: usize,
    max_queue_depth: usize,
    executor: Arc<dyn TaskExecutor>,
    issuer: Arc<TokenIssuer>,
    audit: Arc<AuditLog>,
}

impl BuildQueue {
    /// Creates a new build queue bound to an issuer, executor, and audit log.
    pub fn new(
        max_concurrent: usize,
        max_queue_depth: usize,
        executor: Arc<dyn TaskExecutor>,
        issuer: Arc<TokenIssuer>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            state: RwLock::new(QueueState {
                queued: Vec::new(),
                next_id: 0,
            }),
            active_count: AtomicUsize::new(0),
            max_concurrent,
            max_queue_depth,
            executor,
            issuer,
            audit,
        }
    }

    /// Returns the number of tasks currently waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.state.read().queued.len()
    }

    /// Returns whether the queue currently holds no waiting tasks.
    pub fn is_empty(&self) -> bool {
        self.queue_depth() == 0
    }

    /// Returns the number of tasks currently executing.
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Validates `request.token_id`, then appends a task inheriting that
    /// token's priority, insert-sorted so higher priority drains first with
    /// FIFO tie-break within a priority class.
    pub fn submit(&self, request: SubmitRequest) -> GovernorResult<String> {
        if !self.issuer.validate(&request.token_id) {
            return Err(GovernorError::InvalidToken(request.token_id));
        }

        let mut state = self.state.write();
        if state.queued.len() >= self.max_queue_depth {
            return Err(GovernorError::QueueFull);
        }

        let priority = self
            .issuer
            .get(&request.token_id)
            .map(|t| t.priority)
            .unwrap_or(crate::token::DEFAULT_PRIORITY);

        let id = format!("task-{}", state.next_id);
        state.next_id += 1;

        let task = QueuedTask {
            id: id.clone(),
            label: request.label,
            owner: request.owner,
            token_id: request.token_id,
            priority,
            status: TaskStatus::Queued,
            payload: request.payload,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };

        let insert_at = state.queued.partition_point(|t| t.priority >= priority);
        state.queued.insert(insert_at, task);
        drop(state);

        self.audit.record(
            "task.queued",
            "governor",
            &id,
            serde_json::json!({ "priority": priority }),
        );

        Ok(id)
    }

    /// Pops the highest-priority queued task and resolves it against its
    /// executor. Returns `None` immediately (without blocking) if the queue
    /// is empty or `active_count` is already at `max_concurrent`.
    pub async fn process_next(&self) -> Option<QueuedTask> {
        if self.active_count() >= self.max_concurrent {
            return None;
        }

        let mut task = {
            let mut state = self.state.write();
            if state.queued.is_empty() {
                return None;
            }
            state.queued.remove(0)
        };

        if !self.issuer.validate(&task.token_id) {
            task.status = TaskStatus::Cancelled;
            task.error = Some("token no longer valid".to_string());
            task.finished_at = Some(Utc::now());
            self.audit.record("task.cancelled", "governor", &task.id, serde_json::json!({}));
            return Some(task);
        }

        self.active_count.fetch_add(1, Ordering::SeqCst);
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());

        let outcome = self.executor.execute(&task).await;
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        task.finished_at = Some(Utc::now());

        match outcome {
            Ok(result) => {
                task.status = TaskStatus::Completed;
                task.result = Some(result);
                self.issuer.consume(&task.token_id);
                self.audit.record("task.completed", "governor", &task.id, serde_json::json!({}));
            }
            Err(message) => {
                task.status = TaskStatus::Failed;
                task.error = Some(message);
                self.audit.record("task.failed", "governor", &task.id, serde_json::json!({}));
            }
        }

        Some(task)
    }

    /// Repeatedly processes the next task until the queue is empty,
    /// returning every resolved task in completion order. Cooperatively
    /// yields when capacity-blocked rather than busy-looping.
    pub async fn drain(&self) -> Vec<QueuedTask> {
        let mut results = Vec::new();
        while !self.is_empty() {
            match self.process_next().await {
                Some(task) => results.push(task),
                None => tokio::task::yield_now().await,
            }
        }
        results
    }

    /// Removes a queued task, auditing the cancellation. Has no effect (and
    /// returns `false`) if the task is already running or unknown.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(pos) = state.queued.iter().position(|t| t.id == task_id) else {
            return false;
        };
        state.queued.remove(pos);
        drop(state);
        self.audit.record("task.cancelled", "governor", task_id, serde_json::json!({}));
        true
    }

    /// Drops every queued (not running) task.
    pub fn clear(&self) {
        self.state.write().queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ResourceLimits, TokenRequest};

    struct AlwaysSucceeds;

    #[async_trait]
    impl TaskExecutor for AlwaysSucceeds {
        async fn execute(&self, task: &QueuedTask) -> Result<Value, String> {
            Ok(serde_json::json!({ "label": task.label }))
        }
    }

    fn limits() -> ResourceLimits {
        ResourceLimits {
            total_cpu_millis: 100_000,
            total_memory_bytes: 100_000_000_000,
            max_concurrent: 4,
            max_queue_depth: 16,
        }
    }

    fn queue() -> (BuildQueue, Arc<TokenIssuer>) {
        let audit = Arc::new(AuditLog::new());
        let issuer = Arc::new(TokenIssuer::new(limits(), audit.clone()));
        let queue = BuildQueue::new(4, 16, Arc::new(AlwaysSucceeds), issuer.clone(), audit);
        (queue, issuer)
    }

    #[tokio::test]
    async fn priority_drain_scenario() {
        let (queue, issuer) = queue();

        let mut priorities = vec![2u8, 9, 5];
        let mut labels = Vec::new();
        for priority in priorities.drain(..) {
            let mut request = TokenRequest::new("plugin-a");
            request.priority = Some(priority);
            let token = issuer.issue(&request).unwrap();
            labels.push(format!("priority{priority}"));
            queue
                .submit(SubmitRequest {
                    label: format!("priority{priority}"),
                    owner: "plugin-a".to_string(),
                    token_id: token.id,
                    payload: serde_json::json!({}),
                })
                .unwrap();
        }

        let results = queue.drain().await;
        let order: Vec<String> = results.iter().map(|t| t.label.clone()).collect();
        assert_eq!(order, vec!["priority9", "priority5", "priority2"]);
        assert!(results.iter().all(|t| t.status == TaskStatus::Completed));

        for task in &results {
            let token = issuer.get(&task.token_id).unwrap();
            assert!(token.consumed);
        }
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_at_submit() {
        let (queue, _issuer) = queue();
        let err = queue.submit(SubmitRequest {
            label: "x".to_string(),
            owner: "plugin-a".to_string(),
            token_id: "ghost".to_string(),
            payload: serde_json::json!({}),
        });
        assert!(matches!(err, Err(GovernorError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn cancel_removes_queued_task() {
        let (queue, issuer) = queue();
        let token = issuer.issue(&TokenRequest::new("plugin-a")).unwrap();
        let id = queue
            .submit(SubmitRequest {
                label: "x".to_string(),
                owner: "plugin-a".to_string(),
                token_id: token.id,
                payload: serde_json::json!({}),
            })
            .unwrap();

        assert!(queue.cancel(&id));
        assert_eq!(queue.queue_depth(), 0);
        assert!(!queue.cancel(&id));
    }
}
