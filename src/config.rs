// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Run configuration and validation.
//!
//! A [`RunConfig`] fully determines a run together with its seed. Configs
//! are built in code through the `with_*` helpers or deserialized from TOML,
//! where every field except the three quorum parameters has a default.
//!
//! Validation distinguishes two kinds of rejection. Structural errors
//! (impossible node counts, assignments for nodes that do not exist) always
//! reject. Violations of the two quorum safety laws and byzantine
//! assignments exceeding the fault assumption reject by default but can be
//! waived with `allow_unsafe`; probing such configurations is half the point
//! of a safety simulator.

use std::collections::BTreeSet;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeId;
use crate::bus::DeliveryOrder;
use crate::faults::{ByzantineStrategy, Honesty};
use crate::quorum::{self, QuorumViolation};

/// Default per-instance round budget before declaring a stall.
pub const DEFAULT_ROUND_TIMEOUT: u64 = 8;

/// A byzantine role assignment in a [`RunConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByzantineAssignment {
    /// Node to corrupt.
    pub node: NodeId,
    /// Behavior profile for the whole run.
    pub strategy: ByzantineStrategy,
}

/// Complete configuration of a single simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of nodes `n`.
    pub num_nodes: u64,
    /// Fault tolerance assumption `f` the quorum laws are checked against.
    ///
    /// Deliberately independent of how many nodes are actually corrupted
    /// below: the gap between assumption and reality is a thing worth
    /// simulating.
    pub assumed_faults: u64,
    /// Distinct votes required to finalize a value.
    pub quorum_size: u64,
    /// Rounds an instance may take before uncommitted nodes stall.
    #[serde(default = "default_round_timeout")]
    pub round_timeout: u64,
    /// Consensus instances to run back to back.
    #[serde(default = "default_num_instances")]
    pub num_instances: u64,
    /// Corrupted nodes and their behavior profiles.
    #[serde(default)]
    pub byzantine: Vec<ByzantineAssignment>,
    /// Delivery order policy of the message bus.
    #[serde(default)]
    pub delivery: DeliveryOrder,
    /// Seed for all randomized decisions of the run.
    #[serde(default)]
    pub seed: u64,
    /// Accepts configurations that fail the safety laws instead of rejecting
    /// them. Structural errors still reject.
    #[serde(default)]
    pub allow_unsafe: bool,
}

const fn default_round_timeout() -> u64 {
    DEFAULT_ROUND_TIMEOUT
}

const fn default_num_instances() -> u64 {
    1
}

/// Rejected configurations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a run needs at least one node")]
    NoNodes,
    #[error("fault assumption f={f} must be smaller than n={n}")]
    FaultBoundTooLarge { n: u64, f: u64 },
    #[error("quorum size {quorum} must be between 1 and n={n}")]
    QuorumOutOfRange { n: u64, quorum: u64 },
    #[error("round timeout must be at least 1")]
    ZeroRoundTimeout,
    #[error("a run needs at least one instance")]
    NoInstances,
    #[error("byzantine assignment for unknown node {node} (n={n})")]
    UnknownNode { node: NodeId, n: u64 },
    #[error("node {node} has more than one byzantine assignment")]
    DuplicateAssignment { node: NodeId },
    #[error(transparent)]
    UnsafeQuorum(#[from] QuorumViolation),
    #[error("{actual} byzantine nodes exceed the fault assumption f={assumed}")]
    TooManyByzantine { actual: u64, assumed: u64 },
}

impl RunConfig {
    /// Creates a config with the given quorum parameters and defaults
    /// everywhere else: no byzantine nodes, uniform delivery, seed 0.
    #[must_use]
    pub const fn new(num_nodes: u64, assumed_faults: u64, quorum_size: u64) -> Self {
        Self {
            num_nodes,
            assumed_faults,
            quorum_size,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            num_instances: 1,
            byzantine: Vec::new(),
            delivery: DeliveryOrder::Uniform,
            seed: 0,
            allow_unsafe: false,
        }
    }

    /// Creates a config using the classical quorum size for `(n, f)`.
    #[must_use]
    pub const fn classical(num_nodes: u64, assumed_faults: u64) -> Self {
        Self::new(
            num_nodes,
            assumed_faults,
            quorum::classical_quorum(num_nodes, assumed_faults),
        )
    }

    /// Sets the run seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the per-instance round budget.
    #[must_use]
    pub const fn with_round_timeout(mut self, round_timeout: u64) -> Self {
        self.round_timeout = round_timeout;
        self
    }

    /// Sets the number of instances to run.
    #[must_use]
    pub const fn with_instances(mut self, num_instances: u64) -> Self {
        self.num_instances = num_instances;
        self
    }

    /// Sets the delivery order policy.
    #[must_use]
    pub const fn with_delivery(mut self, delivery: DeliveryOrder) -> Self {
        self.delivery = delivery;
        self
    }

    /// Corrupts one more node with the given strategy.
    #[must_use]
    pub fn with_byzantine(mut self, node: NodeId, strategy: ByzantineStrategy) -> Self {
        self.byzantine.push(ByzantineAssignment { node, strategy });
        self
    }

    /// Waives the safety-law checks during validation.
    #[must_use]
    pub const fn with_unsafe_quorums(mut self) -> Self {
        self.allow_unsafe = true;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns a structural error unconditionally. Safety-law rejections
    /// ([`ConfigError::UnsafeQuorum`] and [`ConfigError::TooManyByzantine`])
    /// are returned only when `allow_unsafe` is off, otherwise they are
    /// logged and waived.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.assumed_faults >= self.num_nodes {
            return Err(ConfigError::FaultBoundTooLarge {
                n: self.num_nodes,
                f: self.assumed_faults,
            });
        }
        if self.quorum_size == 0 || self.quorum_size > self.num_nodes {
            return Err(ConfigError::QuorumOutOfRange {
                n: self.num_nodes,
                quorum: self.quorum_size,
            });
        }
        if self.round_timeout == 0 {
            return Err(ConfigError::ZeroRoundTimeout);
        }
        if self.num_instances == 0 {
            return Err(ConfigError::NoInstances);
        }
        let mut corrupted = BTreeSet::new();
        for assignment in &self.byzantine {
            if assignment.node >= self.num_nodes {
                return Err(ConfigError::UnknownNode {
                    node: assignment.node,
                    n: self.num_nodes,
                });
            }
            if !corrupted.insert(assignment.node) {
                return Err(ConfigError::DuplicateAssignment {
                    node: assignment.node,
                });
            }
        }

        if let Err(violation) =
            quorum::validate(self.num_nodes, self.assumed_faults, self.quorum_size)
        {
            if !self.allow_unsafe {
                return Err(violation.into());
            }
            warn!("running unsafe quorum configuration: {violation}");
        }
        let actual = self.byzantine.len() as u64;
        if actual > self.assumed_faults {
            if !self.allow_unsafe {
                return Err(ConfigError::TooManyByzantine {
                    actual,
                    assumed: self.assumed_faults,
                });
            }
            warn!(
                "running with {actual} byzantine nodes over the fault assumption f={}",
                self.assumed_faults
            );
        }
        Ok(())
    }

    /// Expands the byzantine assignment list into per-node honesty.
    #[must_use]
    pub fn honesty(&self) -> Vec<Honesty> {
        let mut honesty = vec![Honesty::Honest; self.num_nodes as usize];
        for assignment in &self.byzantine {
            honesty[assignment.node as usize] = Honesty::Byzantine(assignment.strategy);
        }
        honesty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_configs_are_valid() {
        for n in 1..=20u64 {
            for f in 0..n.div_ceil(3) {
                assert_eq!(RunConfig::classical(n, f).validate(), Ok(()));
            }
        }
    }

    #[test]
    fn structural_errors_always_reject() {
        assert_eq!(
            RunConfig::new(0, 0, 1).validate(),
            Err(ConfigError::NoNodes)
        );
        assert_eq!(
            RunConfig::new(4, 4, 3).validate(),
            Err(ConfigError::FaultBoundTooLarge { n: 4, f: 4 })
        );
        assert_eq!(
            RunConfig::new(4, 1, 5).validate(),
            Err(ConfigError::QuorumOutOfRange { n: 4, quorum: 5 })
        );
        assert_eq!(
            RunConfig::new(4, 1, 3).with_round_timeout(0).validate(),
            Err(ConfigError::ZeroRoundTimeout)
        );
        assert_eq!(
            RunConfig::new(4, 1, 3).with_instances(0).validate(),
            Err(ConfigError::NoInstances)
        );
        // allow_unsafe waives none of these
        let config = RunConfig::new(4, 1, 3)
            .with_byzantine(7, ByzantineStrategy::Silent)
            .with_unsafe_quorums();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownNode { node: 7, n: 4 })
        );
        let config = RunConfig::new(4, 1, 3)
            .with_byzantine(2, ByzantineStrategy::Silent)
            .with_byzantine(2, ByzantineStrategy::Equivocate)
            .with_unsafe_quorums();
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateAssignment { node: 2 })
        );
    }

    #[test]
    fn unsafe_quorums_reject_unless_waived() {
        let config = RunConfig::new(4, 1, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsafeQuorum(QuorumViolation::Intersection { .. }))
        ));
        assert_eq!(config.with_unsafe_quorums().validate(), Ok(()));
    }

    #[test]
    fn overcorrupted_runs_reject_unless_waived() {
        let config = RunConfig::new(4, 1, 3)
            .with_byzantine(2, ByzantineStrategy::Silent)
            .with_byzantine(3, ByzantineStrategy::Silent);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyByzantine {
                actual: 2,
                assumed: 1
            })
        );
        assert_eq!(config.with_unsafe_quorums().validate(), Ok(()));
    }

    #[test]
    fn honesty_expansion() {
        let config = RunConfig::new(4, 1, 3).with_byzantine(2, ByzantineStrategy::Silent);
        let honesty = config.honesty();
        assert_eq!(honesty.len(), 4);
        assert!(honesty[0].is_honest());
        assert_eq!(honesty[2], Honesty::Byzantine(ByzantineStrategy::Silent));
    }

    #[test]
    fn toml_configs_use_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            num_nodes = 7
            assumed_faults = 2
            quorum_size = 5
            delivery = "jittered"

            [[byzantine]]
            node = 5
            strategy = "equivocate"

            [[byzantine]]
            node = 6
            strategy = { delay = { rounds = 2 } }
            "#,
        )
        .unwrap();
        assert_eq!(config.num_nodes, 7);
        assert_eq!(config.round_timeout, DEFAULT_ROUND_TIMEOUT);
        assert_eq!(config.num_instances, 1);
        assert_eq!(config.delivery, DeliveryOrder::Jittered);
        assert_eq!(config.seed, 0);
        assert!(!config.allow_unsafe);
        assert_eq!(config.byzantine.len(), 2);
        assert_eq!(
            config.byzantine[1].strategy,
            ByzantineStrategy::Delay { rounds: 2 }
        );
        assert_eq!(config.validate(), Ok(()));
    }
}
