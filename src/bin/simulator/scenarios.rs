// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named preset scenarios.
//!
//! Each preset is a small, hand-checked configuration showing one corner of
//! the quorum design space. `underprovisioned` is the deliberate
//! counterexample: its quorum of 2 fails the intersection law, and with an
//! equivocating proposer and adversary-friendly delivery the run produces an
//! actual safety violation.

use flexquorum::{ByzantineStrategy, DeliveryOrder, RunConfig};

/// Scenario names with one-line descriptions, for `--list`.
pub const ALL: &[(&str, &str)] = &[
    ("basic", "7 nodes, classical quorum, no faults"),
    ("one_equivocator", "7 nodes tolerating 2 faults, one equivocator"),
    (
        "two_equivocators",
        "7 nodes tolerating 2 faults, two colluding equivocators",
    ),
    ("silent_leader", "4 nodes, the first proposer stays silent"),
    ("laggard", "5 nodes, one node delivering two rounds late"),
    (
        "underprovisioned",
        "4 nodes with a quorum of 2, violates the intersection law",
    ),
    ("mixed", "10 nodes with a mixed byzantine crowd"),
];

/// Returns the preset configuration for `name`.
#[must_use]
pub fn by_name(name: &str) -> Option<RunConfig> {
    let config = match name {
        "basic" => RunConfig::classical(7, 2).with_instances(3),
        "one_equivocator" => RunConfig::classical(7, 2)
            .with_byzantine(1, ByzantineStrategy::Equivocate)
            .with_instances(3),
        "two_equivocators" => RunConfig::classical(7, 2)
            .with_byzantine(5, ByzantineStrategy::Equivocate)
            .with_byzantine(6, ByzantineStrategy::Equivocate)
            .with_delivery(DeliveryOrder::AdversaryFirst)
            .with_instances(7),
        "silent_leader" => RunConfig::classical(4, 1)
            .with_byzantine(0, ByzantineStrategy::Silent)
            .with_instances(2),
        "laggard" => RunConfig::classical(5, 1)
            .with_byzantine(2, ByzantineStrategy::Delay { rounds: 2 })
            .with_instances(3),
        "underprovisioned" => RunConfig::new(4, 1, 2)
            .with_byzantine(3, ByzantineStrategy::Equivocate)
            .with_delivery(DeliveryOrder::AdversaryFirst)
            .with_instances(4)
            .with_unsafe_quorums(),
        "mixed" => RunConfig::classical(10, 3)
            .with_byzantine(3, ByzantineStrategy::Silent)
            .with_byzantine(6, ByzantineStrategy::Conflicting)
            .with_byzantine(9, ByzantineStrategy::Random)
            .with_instances(5),
        _ => return None,
    };
    Some(config)
}
