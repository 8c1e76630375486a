//! `wardenctl`: a thin operator CLI around [`WardenRuntime`].
//!
//! Commands: `doctor | verify | config | status | plugins | adapters | help`.
//! Exit codes: 0 on success, 1 for an unknown command or an operational
//! failure. All output goes to standard streams; nothing is persisted.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use warden_core::AdapterRegistry;
use warden_governor::{QueuedTask, TaskExecutor};
use warden_runtime::config::{ConfigLoader, WardenConfig};
use warden_runtime::{LoggingBuilder, WardenRuntime};

#[derive(Parser, Debug)]
#[command(name = "wardenctl", version, about = "Operator CLI for the Warden control plane")]
struct Cli {
    /// Command to run: doctor | verify | config | status | plugins | adapters | help
    command: String,

    /// Path to a configuration file (default: search paths, then defaults).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Completes every submitted task immediately with its own payload. Real
/// execution is delegated to whatever the embedder injects; `wardenctl`
/// only needs a task executor to construct a runtime at all.
struct NoopExecutor;

#[async_trait]
impl TaskExecutor for NoopExecutor {
    async fn execute(&self, task: &QueuedTask) -> Result<serde_json::Value, String> {
        Ok(task.payload.clone())
    }
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<WardenConfig> {
    let config = match path {
        Some(p) => ConfigLoader::new().load_from_file(p)?,
        None => ConfigLoader::default().load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingBuilder::new().init();

    let exit_code = match cli.command.as_str() {
        "doctor" => run_doctor(&cli.config).await,
        "verify" => run_verify(&cli.config).await,
        "config" => run_config(&cli.config),
        "status" => run_status(&cli.config).await,
        "plugins" => run_plugins(&cli.config).await,
        "adapters" => run_adapters(),
        "help" => run_help(),
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("valid commands: doctor | verify | config | status | plugins | adapters | help");
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run_doctor(config_path: &Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return 1;
        }
    };

    let runtime = match WardenRuntime::new(config, Arc::new(NoopExecutor)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("runtime assembly failed: {e}");
            return 1;
        }
    };

    if let Err(e) = runtime.init().await {
        eprintln!("boot failed: {e}");
        return 1;
    }
    if let Err(e) = runtime.stop().await {
        eprintln!("shutdown failed: {e}");
        return 1;
    }

    println!("doctor: configuration valid, boot and shutdown both succeeded");
    0
}

async fn run_verify(config_path: &Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return 1;
        }
    };

    let runtime = match WardenRuntime::new(config, Arc::new(NoopExecutor)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("runtime assembly failed: {e}");
            return 1;
        }
    };

    if let Err(e) = runtime.init().await {
        eprintln!("boot failed: {e}");
        return 1;
    }

    let verdict = runtime.invariants().check(&runtime.governor().facade().invariant_context()).await;
    let _ = runtime.stop().await;

    for outcome in &verdict.results {
        let status = if outcome.passed { "PASS" } else { "FAIL" };
        println!("{status}  {} (owner: {})", outcome.name, outcome.owner);
        if let Some(err) = &outcome.error {
            println!("       error: {err}");
        }
    }

    if verdict.allowed {
        println!("verify: all {} invariant(s) passed", verdict.results.len());
        0
    } else {
        eprintln!("verify: invariant violations present");
        1
    }
}

fn run_config(config_path: &Option<PathBuf>) -> i32 {
    match load_config(config_path) {
        Ok(config) => match serde_yaml::to_string(&config) {
            Ok(yaml) => {
                print!("{yaml}");
                0
            }
            Err(e) => {
                eprintln!("failed to render configuration: {e}");
                1
            }
        },
        Err(e) => {
            eprintln!("config error: {e}");
            1
        }
    }
}

async fn run_status(config_path: &Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return 1;
        }
    };

    let runtime = match WardenRuntime::new(config, Arc::new(NoopExecutor)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("runtime assembly failed: {e}");
            return 1;
        }
    };

    if let Err(e) = runtime.init().await {
        eprintln!("boot failed: {e}");
        return 1;
    }

    let context = runtime.governor().facade().invariant_context();
    println!("{}", serde_json::to_string_pretty(&context).unwrap());

    let _ = runtime.stop().await;
    0
}

async fn run_plugins(config_path: &Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return 1;
        }
    };
    let configured: Vec<&String> = config.plugins.keys().collect();

    let runtime = match WardenRuntime::new(config.clone(), Arc::new(NoopExecutor)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("runtime assembly failed: {e}");
            return 1;
        }
    };

    if let Err(e) = runtime.init().await {
        eprintln!("boot failed: {e}");
        return 1;
    }

    println!("governor (built in, always registered)");
    for id in &configured {
        println!("{id} (configured)");
    }

    let _ = runtime.stop().await;
    0
}

fn run_adapters() -> i32 {
    let registry = AdapterRegistry::new();
    if registry.is_empty() {
        println!("no chain adapters registered (concrete adapters are supplied by the embedder)");
    }
    0
}

fn run_help() -> i32 {
    println!(
        "wardenctl commands:\n\
         \x20 doctor    load config, boot and shut down every plugin, report success\n\
         \x20 verify    boot, then evaluate every registered invariant once\n\
         \x20 config    print the resolved configuration as YAML\n\
         \x20 status    print live governor resource usage and limits\n\
         \x20 plugins   list configured plugins\n\
         \x20 adapters  list registered chain adapters\n\
         \x20 help      print this message"
    );
    0
}
