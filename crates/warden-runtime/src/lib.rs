//! # Warden Runtime
//!
//! Orchestration layer for the Warden control plane: configuration loading,
//! logging setup, and the [`WardenRuntime`] that assembles the core loader
//! and the governor plugin into one process.
//!
//! ```rust,ignore
//! use warden_runtime::{WardenRuntime, config::WardenConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = warden_runtime::config::load_config()?;
//!     let runtime = WardenRuntime::new(config, my_executor)?;
//!     runtime.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::WardenConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::WardenRuntime;

/// Prelude for common imports.
pub mod prelude {
    pub use super::config::WardenConfig;
    pub use super::runtime::WardenRuntime;
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
