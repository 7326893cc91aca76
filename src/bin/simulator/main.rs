// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scenario runner for the flexible-quorum consensus simulator.
//!
//! Runs a named preset scenario or a TOML run configuration, prints the
//! safety report, and optionally dumps the full event stream as JSON lines.

mod scenarios;

use std::fs;
use std::io::Write;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use flexquorum::{ConsensusEngine, RunConfig, logging};

/// Flexible-quorum BFT consensus simulator.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Named scenario to run (see --list).
    #[arg(long, default_value = "basic", conflicts_with = "config")]
    scenario: String,
    /// TOML file holding a run configuration.
    #[arg(long)]
    config: Option<String>,
    /// Overrides the configured seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides the configured number of instances.
    #[arg(long)]
    instances: Option<u64>,
    /// Prints the event stream as JSON lines on stdout.
    #[arg(long)]
    json: bool,
    /// Lists available scenarios and exits.
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    // enable fancy `color_eyre` error messages
    color_eyre::install()?;
    logging::enable_logforth();

    let args = Args::parse();
    if args.list {
        for (name, description) in scenarios::ALL {
            println!("{name:<18} {description}");
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).context("Can not read config file")?;
            toml::from_str::<RunConfig>(&raw).context("Can not parse config file")?
        }
        None => scenarios::by_name(&args.scenario)
            .ok_or_else(|| eyre!("unknown scenario {:?}, try --list", args.scenario))?,
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(instances) = args.instances {
        config.num_instances = instances;
    }

    let output = ConsensusEngine::new(config)?.run()?;

    if args.json {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for event in &output.events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
    }
    println!("{}", output.report);
    Ok(())
}
