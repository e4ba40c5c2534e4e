// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! simnet: a standalone driver for the discrete-event simulation core.
//!
//! # Usage
//!
//! ```bash
//! # Run a demonstration workload against a topology file
//! simnet --graph topology.graphml --end-time-ns 1000000
//!
//! # Using a config file
//! simnet --config engine.toml
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use sim_engine::{Engine, EngineConfig, Event, SimulationTime};
use sim_topology::{Address, ShadowId};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "simnet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discrete-event network topology simulation driver")]
struct Cli {
    /// Path to a TOML configuration file; overrides the other flags if set.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the GraphML topology file.
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Number of worker threads.
    #[arg(long, default_value = "4")]
    worker_threads: usize,

    /// Minimum cross-host event delay, in nanoseconds.
    #[arg(long, default_value = "10000")]
    min_time_jump_ns: u64,

    /// Simulated end time, in nanoseconds.
    #[arg(long, default_value = "1000000")]
    end_time_ns: u64,

    /// RNG seed for attach candidate selection.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of demonstration hosts to attach and exchange events between.
    #[arg(long, default_value = "4")]
    demo_hosts: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = match cli.config {
        Some(path) => EngineConfig::from_file(&path).context("loading engine config")?,
        None => {
            let graph_path = cli
                .graph
                .context("--graph is required unless --config is given")?;
            let config = EngineConfig {
                worker_threads: cli.worker_threads,
                min_time_jump_ns: cli.min_time_jump_ns,
                end_time_ns: cli.end_time_ns,
                graph_path,
                seed: cli.seed,
            };
            config.validate().context("validating engine config")?;
            config
        }
    };

    let seed = config.seed;
    let mut engine = Engine::new(config).context("loading topology and constructing engine")?;
    let router = engine.router();

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut addresses = Vec::with_capacity(cli.demo_hosts);
    for i in 0..cli.demo_hosts {
        let address = Address::new(i as u32, Ipv4Addr::new(10, 0, 0, (i + 1) as u8));
        router
            .attach(address, &mut rng, &Default::default())
            .context("attaching demonstration host")?;
        addresses.push(address);
    }

    for (i, address) in addresses.iter().enumerate() {
        let destination: ShadowId = address.id;
        let router = router.clone();
        let src = *address;
        let dst = addresses[(i + 1) % addresses.len()];
        engine.push_event(Event::new(
            SimulationTime::from_nanos((i as u64) * 100),
            destination,
            0,
            move || {
                let latency = router.get_latency(src, dst);
                tracing::info!(host = %src.id, peer = %dst.id, latency, "demonstration event fired");
                Vec::new()
            },
        ));
    }

    ctrlc::set_handler(|| {
        tracing::warn!("received interrupt signal; engine will finish its current window");
    })
    .ok();

    Ok(engine.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_requires_graph_or_config() {
        let cli = Cli {
            config: None,
            graph: None,
            worker_threads: 1,
            min_time_jump_ns: 1000,
            end_time_ns: 1000,
            seed: 0,
            demo_hosts: 1,
            log_level: "info".to_string(),
        };
        assert!(run(cli).is_err());
    }
}
