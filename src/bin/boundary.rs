// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sweeps the quorum parameter space and maps the safety boundary.
//!
//! For every combination of `n` nodes, `f` assumed faults and quorum size `q`
//! in the grid, this runs the simulation with the strongest simple adversary:
//! the top `f` nodes equivocate in a half-split and their traffic is delivered
//! before honest cross-traffic. Results land in a CSV file with one row per
//! grid cell.
//!
//! The interesting column pair is `predicted_safe` vs `violations`:
//! `predicted_safe` is the analytical bound (`q + f <= n` and `2q > n + f`),
//! `violations` is what the adversary actually achieved. Cells inside the
//! predicted-safe region must show zero violations.

use std::fs::File;

use clap::Parser;
use color_eyre::Result;
use flexquorum::{
    ByzantineStrategy, ConsensusEngine, DeliveryOrder, RunConfig, logging, quorum,
};
use log::{info, warn};
use rayon::prelude::*;

/// Safety boundary mapper for flexible quorum parameters.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Largest number of nodes to sweep up to.
    #[arg(long, default_value_t = 9)]
    max_nodes: u64,
    /// Consensus instances to run per grid cell.
    #[arg(long, default_value_t = 8)]
    instances: u64,
    /// Base seed, mixed with the cell coordinates.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Output CSV file.
    #[arg(short, long, default_value = "boundary.csv")]
    out: String,
}

fn main() -> Result<()> {
    // enable fancy `color_eyre` error messages
    color_eyre::install()?;

    logging::enable_logforth_stderr();

    let args = Args::parse();

    let mut grid = Vec::new();
    for num_nodes in 1..=args.max_nodes {
        for faults in 0..num_nodes {
            for quorum in 1..=num_nodes {
                grid.push((num_nodes, faults, quorum));
            }
        }
    }
    info!("sweeping {} quorum configurations", grid.len());

    let rows = grid
        .into_par_iter()
        .map(|cell| sweep_cell(cell, args.instances, args.seed))
        .collect::<Result<Vec<_>>>()?;

    let mut writer = csv::Writer::from_writer(File::create(&args.out)?);
    writer.write_record([
        "n",
        "f",
        "quorum",
        "classical",
        "predicted_safe",
        "violations",
        "stalls",
        "rounds",
    ])?;
    let mut broken = 0usize;
    let mut bound_failures = 0usize;
    for row in &rows {
        if row.violations > 0 {
            broken += 1;
            if row.predicted_safe {
                bound_failures += 1;
            }
        }
        writer.write_record(row.record())?;
    }
    writer.flush()?;

    info!(
        "swept {} cells: {broken} broken by the equivocation attack, results in {}",
        rows.len(),
        args.out
    );
    if bound_failures > 0 {
        warn!("{bound_failures} cells inside the predicted-safe region were broken");
    }
    Ok(())
}

struct SweepRow {
    num_nodes: u64,
    faults: u64,
    quorum: u64,
    predicted_safe: bool,
    violations: usize,
    stalls: usize,
    rounds: u64,
}

impl SweepRow {
    fn record(&self) -> [String; 8] {
        [
            self.num_nodes.to_string(),
            self.faults.to_string(),
            self.quorum.to_string(),
            quorum::classical_quorum(self.num_nodes, self.faults).to_string(),
            self.predicted_safe.to_string(),
            self.violations.to_string(),
            self.stalls.to_string(),
            self.rounds.to_string(),
        ]
    }
}

/// Runs the equivocation attack against a single `(n, f, q)` cell.
fn sweep_cell(cell: (u64, u64, u64), instances: u64, seed: u64) -> Result<SweepRow> {
    let (num_nodes, faults, quorum) = cell;
    let mut config = RunConfig::new(num_nodes, faults, quorum)
        .with_instances(instances)
        .with_delivery(DeliveryOrder::AdversaryFirst)
        .with_seed(seed.wrapping_add(num_nodes * 10_007 + faults * 101 + quorum))
        .with_unsafe_quorums();
    for node in num_nodes - faults..num_nodes {
        config = config.with_byzantine(node, ByzantineStrategy::Equivocate);
    }

    let output = ConsensusEngine::new(config)?.run()?;
    Ok(SweepRow {
        num_nodes,
        faults,
        quorum,
        predicted_safe: quorum::validate(num_nodes, faults, quorum).is_ok(),
        violations: output.report.violations.len(),
        stalls: output.report.stalls.len(),
        rounds: output.report.total_rounds,
    })
}
