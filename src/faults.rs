// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byzantine fault injection.
//!
//! Every node carries an [`Honesty`] assignment for the whole run. Once per
//! round the engine asks the injector for a [`BehaviorDirective`] per node,
//! in node id order; honest nodes always get [`BehaviorDirective::Normal`],
//! byzantine nodes get a directive derived from their [`ByzantineStrategy`].
//!
//! All fabricated values come from a nonce counter, so they never collide
//! with canonical proposals or with each other. Equivocators collude: within
//! one consensus instance they all push the same pair of conflicting values,
//! which is the strongest version of the attack. The only randomized choice
//! is the per-round sampling of [`ByzantineStrategy::Random`], drawn from an
//! rng seeded by the run, so directive streams are reproducible.

use log::trace;
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::NodeId;
use crate::types::{Round, Value};

/// Honesty assignment for a single node, fixed for a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Honesty {
    /// Follows the protocol.
    Honest,
    /// Deviates according to the given strategy.
    Byzantine(ByzantineStrategy),
}

impl Honesty {
    /// Returns `true` iff this node follows the protocol.
    #[must_use]
    pub const fn is_honest(&self) -> bool {
        matches!(self, Self::Honest)
    }
}

/// Per-node byzantine behavior profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByzantineStrategy {
    /// Push conflicting values to the two halves of the network.
    Equivocate,
    /// Send nothing at all.
    Silent,
    /// Act honestly, but all messages arrive the given number of rounds late.
    Delay { rounds: u64 },
    /// Propose and vote fresh fabricated values, ignoring own history.
    Conflicting,
    /// Sample one of the other behaviors (or honesty) anew each round.
    Random,
}

/// Behavior directive for one node in one round.
///
/// Directives are a closed set and are consumed by exhaustive match in the
/// engine and the bus. One directive governs everything the node does in the
/// round: its proposal if it is the proposer, its votes, and its commit
/// announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BehaviorDirective {
    /// Follow the protocol.
    Normal,
    /// Offer the first value to the lower half of node ids, the second to the
    /// upper half.
    Equivocate(Value, Value),
    /// Produce no messages this round.
    Silent,
    /// Produce honest messages, delivered the given number of rounds late.
    Delay(u64),
    /// Propose and vote the given fabricated value.
    Conflicting(Value),
}

/// Decides per-round behavior for every node.
pub struct FaultInjector {
    assignments: Vec<Honesty>,
    rng: SmallRng,
    /// Value pair shared by all equivocators within the current instance.
    instance_pair: Option<(Value, Value)>,
    /// Next nonce for fabricated values; never reused within a run.
    next_nonce: u64,
}

impl FaultInjector {
    /// Creates a new injector for the given per-node assignments.
    ///
    /// The rng must be derived from the run seed, otherwise reruns will not
    /// reproduce the directive stream.
    #[must_use]
    pub fn new(assignments: Vec<Honesty>, rng: SmallRng) -> Self {
        Self {
            assignments,
            rng,
            instance_pair: None,
            next_nonce: 0,
        }
    }

    /// Returns the honesty assignment of the given node.
    #[must_use]
    pub fn honesty(&self, node: NodeId) -> Honesty {
        self.assignments[node as usize]
    }

    /// Returns the number of byzantine nodes.
    #[must_use]
    pub fn num_byzantine(&self) -> u64 {
        self.assignments.iter().filter(|h| !h.is_honest()).count() as u64
    }

    /// Resets per-instance adversary state; called when an instance begins.
    pub fn begin_instance(&mut self) {
        self.instance_pair = None;
    }

    /// Decides how the given node behaves in the given round.
    ///
    /// Must be called exactly once per node per round, in node id order, so
    /// the decision stream is identical across reruns.
    pub fn decide(&mut self, node: NodeId, round: Round) -> BehaviorDirective {
        let strategy = match self.assignments[node as usize] {
            Honesty::Honest => return BehaviorDirective::Normal,
            Honesty::Byzantine(strategy) => strategy,
        };
        let directive = self.directive(strategy);
        trace!("round {round}: node {node} directive {directive:?}");
        directive
    }

    fn directive(&mut self, strategy: ByzantineStrategy) -> BehaviorDirective {
        match strategy {
            ByzantineStrategy::Equivocate => {
                let (a, b) = self.equivocation_pair();
                BehaviorDirective::Equivocate(a, b)
            }
            ByzantineStrategy::Silent => BehaviorDirective::Silent,
            ByzantineStrategy::Delay { rounds } => BehaviorDirective::Delay(rounds),
            ByzantineStrategy::Conflicting => BehaviorDirective::Conflicting(self.mint()),
            ByzantineStrategy::Random => {
                let strategy = match self.rng.random_range(0..5u8) {
                    0 => return BehaviorDirective::Normal,
                    1 => ByzantineStrategy::Equivocate,
                    2 => ByzantineStrategy::Silent,
                    3 => ByzantineStrategy::Conflicting,
                    4 => ByzantineStrategy::Delay {
                        rounds: self.rng.random_range(1..=2),
                    },
                    _ => unreachable!(),
                };
                self.directive(strategy)
            }
        }
    }

    /// Returns the instance's equivocation pair, minting it on first use.
    fn equivocation_pair(&mut self) -> (Value, Value) {
        match self.instance_pair {
            Some(pair) => pair,
            None => {
                let pair = (self.mint(), self.mint());
                self.instance_pair = Some(pair);
                pair
            }
        }
    }

    /// Mints a fresh adversarial value.
    fn mint(&mut self) -> Value {
        let value = Value::adversarial(self.next_nonce);
        self.next_nonce += 1;
        value
    }
}
