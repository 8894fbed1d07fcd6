// SPDX-License-Identifier: MIT

//! `poolctl`: the operator-facing debug CLI for the worker pool (spec.md §6
//! observability endpoint). Loads a `PoolConfig`, stands up a pool against
//! it, and prints occupancy/counters or per-worker detail.

use clap::{Parser, Subcommand};
use pool_cli::config::{apply_overrides, load_config};
use pool_engine::pool::Pool;
use pool_engine::spawn::ProcessSpawner;
use pool_core::SystemClock;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "poolctl", about = "Operator CLI for the persistent worker pool")]
struct Cli {
    /// Optional TOML config file, overlaid on the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `PoolConfig::max_workers`.
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// Override `PoolConfig::socket_dir`.
    #[arg(long, global = true)]
    socket_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective pool configuration.
    Config {
        /// Print as JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
    /// Print current pool occupancy and lifetime counters.
    Stats {
        /// Print as JSON instead of a human-readable table.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let config = apply_overrides(config, cli.max_workers, cli.socket_dir.as_deref());

    match cli.command {
        Command::Config { json } => print_config(&config, json),
        Command::Stats { json } => print_stats(config, json),
    }
}

fn print_config(config: &pool_engine::PoolConfig, json: bool) {
    if json {
        match serde_json::to_string_pretty(config) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                eprintln!("error: failed to render config as json: {err}");
                std::process::exit(1);
            }
        }
        return;
    }
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => {
            eprintln!("error: failed to render config as toml: {err}");
            std::process::exit(1);
        }
    }
}

fn print_stats(config: pool_engine::PoolConfig, json: bool) {
    let spawner = ProcessSpawner {
        worker_entry_path: config.worker_entry_path.clone(),
        sessions_base_dir: config.sessions_base_dir.clone(),
    };
    let pool = Pool::new(config, spawner, SystemClock);
    let stats = pool.stats();

    if json {
        match serde_json::to_string_pretty(&stats) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                eprintln!("error: failed to render stats as json: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("workers: {} total, {} ready, {} busy", stats.workers_total, stats.workers_ready, stats.workers_busy);
    println!("queue:   {} queued, {} active", stats.queued_requests, stats.active_requests);
    println!(
        "lifetime: spawned={} evicted={} retired_after_cancel={} kill_escalations={}",
        stats.counters.spawned, stats.counters.evicted, stats.counters.retired_after_cancel, stats.counters.group_kill_escalations
    );

    for worker in pool.debug_snapshot() {
        println!("  worker {} pid={} state={} queries={}", worker.worker_id, worker.pid, worker.state, worker.queries_processed);
    }
}
