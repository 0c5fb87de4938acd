//! Resource index inspection tool.
//!
//! Usage:
//!   cargo run -p rescache_kinds -- [--config cache.json] [--data-dir data]... [--verbose] [--timeout-ms 5000]
//!
//! Discovers the resource indices, preloads every declared resource, drives
//! load completions until everything settled (or the timeout elapsed) and
//! prints a per-container summary before reclaiming everything.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rescache_core::{ResourceConfig, ResourceManager};
use tracing::{info, warn};

struct Args {
    config: ResourceConfig,
    timeout: Duration,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut config = ResourceConfig::default();
    let mut data_dirs = Vec::new();
    let mut verbose = false;
    let mut timeout = Duration::from_secs(5);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let text = std::fs::read_to_string(&args[i + 1])
                    .with_context(|| format!("reading config {}", args[i + 1]))?;
                config = ResourceConfig::from_json_str(&text).context("parsing config")?;
                i += 2;
            }
            "--data-dir" if i + 1 < args.len() => {
                data_dirs.push(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--timeout-ms" if i + 1 < args.len() => {
                timeout = Duration::from_millis(args[i + 1].parse().unwrap_or(5000));
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            other => {
                warn!(arg = %other, "Ignoring unknown argument");
                i += 1;
            }
        }
    }

    if !data_dirs.is_empty() {
        config.data_directories = data_dirs;
    }
    config.verbose |= verbose;
    Ok(Args { config, timeout })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    info!(
        data_dirs = ?args.config.data_directories,
        prefix = %args.config.index_prefix,
        "Starting resource inspection"
    );

    let manager = ResourceManager::new(args.config);
    rescache_kinds::register_all(&manager);
    if !manager.initialize() {
        warn!("Nothing to inspect");
        return Ok(());
    }
    print!("{}", manager.stores());

    let failed_early = rescache_kinds::preload_all(&manager);

    // Update loop: apply completions until nothing is loading.
    let tick = Duration::from_millis(16);
    let deadline = tokio::time::Instant::now() + args.timeout;
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        manager.process_completions();
        let loading = manager.loading_count();
        if loading == 0 {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(loading, "Timed out waiting for resources");
            break;
        }
    }

    println!();
    println!("{:<18} {:<12} {:<8} {:>9} {:>12}", "class", "store", "cplx", "resources", "bytes");
    for container in manager.containers() {
        println!(
            "{:<18} {:<12} {:<8} {:>9} {:>12}",
            container.label(),
            container.store_name(),
            container.complexity().to_string(),
            container.resource_count(),
            container.memory_occupied()
        );
    }
    println!(
        "total: {} bytes, {} failed to preload",
        manager.memory_occupied(),
        failed_early
    );

    let evicted = manager.unload_all_unused();
    info!(evicted, remaining = manager.memory_occupied(), "Unused resources reclaimed");
    manager.terminate();
    Ok(())
}
