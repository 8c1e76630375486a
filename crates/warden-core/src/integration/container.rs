//! The container runtime contract: a small interface the core consumes
//! without owning an implementation. Concrete runtimes (Docker, podman, a
//! test double) are injected by the embedder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContainerResult;

/// The declarative specification used to create a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Image reference.
    pub image: String,
    /// Command and arguments to run.
    pub command: Vec<String>,
    /// Environment variables.
    pub env: Vec<(String, String)>,
}

/// The result of an `exec` call inside a running container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Runtime status of a managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    /// Created but not running.
    Created,
    /// Currently running.
    Running,
    /// Exited.
    Exited,
    /// Unknown to the runtime (e.g. already removed).
    Unknown,
}

/// The small interface the core consumes for container orchestration.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container from `spec`, returning its id.
    async fn create(&self, spec: ContainerSpec) -> ContainerResult<String>;

    /// Stops a running container.
    async fn stop(&self, id: &str) -> ContainerResult<()>;

    /// Removes a stopped container.
    async fn remove(&self, id: &str) -> ContainerResult<()>;

    /// Executes `argv` inside a running container.
    async fn exec(&self, id: &str, argv: &[String]) -> ContainerResult<ExecResult>;

    /// Returns the current status of a container.
    async fn status(&self, id: &str) -> ContainerResult<ContainerStatus>;

    /// Lists every container id known to the runtime.
    async fn list(&self) -> ContainerResult<Vec<String>>;
}
