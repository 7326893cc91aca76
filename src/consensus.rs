// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core consensus simulation logic and data structures.
//!
//! The central structure of the simulator is [`ConsensusEngine`]. It drives
//! `num_instances` consensus instances back to back over a single global
//! round counter, so later instances start under whichever proposer the
//! rotation has reached.
//!
//! Most important component data structures defined in this module are:
//! - [`NodeState`] holds one node's per-instance protocol state.
//! - [`VoteTally`] counts distinct voters per value for one node.
//! - [`SafetyMonitor`] watches all finalizations for honest disagreement.
//!
//! Every round is closed and consists of three phases, each a barrier:
//!
//! 1. Propose: the round's proposer authors, the bus delivers.
//! 2. Vote: all nodes author votes, the bus delivers, nodes tally and
//!    finalize where a quorum completed.
//! 3. Commit: fresh finalizations are announced, the bus delivers.
//!
//! No message authored in a phase is acted on before that phase's delivery,
//! and nothing survives a round boundary except traffic parked inside the
//! [`MessageBus`] by [`BehaviorDirective::Delay`]. Given equal configurations
//! and seeds, two runs produce byte-identical event streams.
//!
//! Safety violations and stalls are findings recorded in the output; only
//! breaches of the engine's own contract abort a run.

pub mod message;
pub mod monitor;
pub mod node;
pub mod tally;

use std::collections::BTreeSet;

use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

use crate::bus::MessageBus;
use crate::config::{ConfigError, RunConfig};
use crate::event::{Event, FinalizationRecord};
use crate::faults::{BehaviorDirective, FaultInjector, Honesty};
use crate::types::{Round, Value};
use crate::{InstanceId, NodeId};

pub use self::message::{Message, MessageKind};
pub use self::monitor::{SafetyMonitor, SafetyReport, ViolationEvidence};
pub use self::node::{NodeState, Phase};
pub use self::tally::{TallyOutcome, VoteTally};

/// Logical ticks per round, one per phase.
pub const TICKS_PER_ROUND: u64 = 3;
/// Tick offset of the propose phase within a round.
const PROPOSE_TICK: u64 = 0;
/// Tick offset of the vote phase within a round.
const VOTE_TICK: u64 = 1;
/// Tick offset of the commit phase within a round.
const COMMIT_TICK: u64 = 2;
const_assert!(COMMIT_TICK < TICKS_PER_ROUND);

/// Breaches of the engine's internal contract.
///
/// These are bugs in the simulator, never findings about the simulated
/// protocol: a run that returns one of these has no meaningful report.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A node finalized a value its own tally has no quorum for.
    #[error("node {node} finalized {value} in instance {instance} with {count} of {quorum} votes")]
    CommitWithoutQuorum {
        node: NodeId,
        instance: InstanceId,
        value: Value,
        count: u64,
        quorum: u64,
    },
    /// A node produced two finalizations for one instance.
    #[error("node {node} finalized instance {instance} twice")]
    DoubleCommit { node: NodeId, instance: InstanceId },
}

/// Everything a finished run produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Event stream in emission order.
    pub events: Vec<Event>,
    /// Aggregate safety and liveness findings.
    pub report: SafetyReport,
}

/// Simulation engine for one configured run.
pub struct ConsensusEngine {
    config: RunConfig,
    nodes: Vec<NodeState>,
    injector: FaultInjector,
    bus: MessageBus,
    monitor: SafetyMonitor,
    events: Vec<Event>,
    /// Global round counter, shared by all instances.
    round: Round,
    /// Guards against a node finalizing one instance twice.
    finalized: BTreeSet<(NodeId, InstanceId)>,
}

impl ConsensusEngine {
    /// Builds an engine for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected by
    /// [`RunConfig::validate`].
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        // one master rng per run, split into independent streams
        let mut master = SmallRng::seed_from_u64(config.seed);
        let injector_rng = SmallRng::seed_from_u64(master.next_u64());
        let bus_rng = SmallRng::seed_from_u64(master.next_u64());

        let honesty = config.honesty();
        let nodes = honesty
            .iter()
            .enumerate()
            .map(|(id, &h)| NodeState::new(id as NodeId, h, config.quorum_size))
            .collect();
        let monitor = SafetyMonitor::new(honesty.iter().map(Honesty::is_honest).collect());
        let injector = FaultInjector::new(honesty, injector_rng);
        let bus = MessageBus::new(config.num_nodes, config.delivery, bus_rng);

        Ok(Self {
            config,
            nodes,
            injector,
            bus,
            monitor,
            events: Vec::new(),
            round: Round::zero(),
            finalized: BTreeSet::new(),
        })
    }

    /// The configuration this engine was built from.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs all configured instances to completion.
    ///
    /// # Errors
    ///
    /// Returns an error iff the engine breaches its own contract.
    pub fn run(mut self) -> Result<RunOutput, ProtocolViolation> {
        info!(
            "starting run: {} nodes, {} assumed faults, quorum {}, {} byzantine, seed {}",
            self.config.num_nodes,
            self.config.assumed_faults,
            self.config.quorum_size,
            self.injector.num_byzantine(),
            self.config.seed,
        );
        for instance in 0..self.config.num_instances {
            self.run_instance(instance)?;
        }

        let equivocations = self
            .nodes
            .iter()
            .map(|node| node.equivocators_seen().len() as u64)
            .sum();
        if self.bus.parked_deliveries() > 0 {
            debug!(
                "{} delayed deliveries never surfaced before the run ended",
                self.bus.parked_deliveries()
            );
        }
        let report =
            self.monitor
                .into_report(self.round.inner(), self.config.num_instances, equivocations);
        info!("run finished: {} violations, {} stalls", report.violations.len(), report.stalls.len());
        Ok(RunOutput {
            events: self.events,
            report,
        })
    }

    fn run_instance(&mut self, instance: InstanceId) -> Result<(), ProtocolViolation> {
        debug!("instance {instance} starting at round {}", self.round);
        self.injector.begin_instance();
        for node in &mut self.nodes {
            node.begin_instance(instance);
        }

        let mut committed_all = false;
        for _ in 0..self.config.round_timeout {
            let round = self.round;
            self.run_round(instance, round)?;
            self.round = self.round.next();
            if self.all_honest_committed() {
                committed_all = true;
                break;
            }
        }

        if !committed_all {
            let stragglers: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|node| node.is_honest() && !node.is_committed())
                .map(NodeState::id)
                .collect();
            for node in &mut self.nodes {
                node.mark_stalled();
            }
            warn!(
                "instance {instance} stalled after {} rounds, honest nodes {stragglers:?} uncommitted",
                self.config.round_timeout
            );
            self.monitor.record_stall(instance);
            self.events.push(Event::Stalled { instance });
        }
        Ok(())
    }

    fn run_round(&mut self, instance: InstanceId, round: Round) -> Result<(), ProtocolViolation> {
        trace!("running round {round} of instance {instance}");
        let num_nodes = self.config.num_nodes;
        let directives: Vec<BehaviorDirective> = (0..num_nodes)
            .map(|node| self.injector.decide(node, round))
            .collect();

        // propose phase
        let proposer = round.proposer(num_nodes);
        let sent_at = round.inner() * TICKS_PER_ROUND + PROPOSE_TICK;
        let proposals = self.nodes[proposer as usize].author_proposals(
            round,
            directives[proposer as usize],
            sent_at,
        );
        for message in &proposals {
            self.events.push(Event::Proposed {
                instance,
                round,
                node: message.sender,
                value: message.value,
            });
        }
        let inboxes = self
            .bus
            .deliver(&proposals, round, MessageKind::Propose, &directives);
        for (node, inbox) in self.nodes.iter_mut().zip(&inboxes) {
            node.observe_proposals(inbox);
        }

        // vote phase
        let sent_at = round.inner() * TICKS_PER_ROUND + VOTE_TICK;
        let mut votes = Vec::new();
        for (node, &directive) in self.nodes.iter_mut().zip(&directives) {
            votes.extend(node.author_votes(round, directive, sent_at));
        }
        for message in &votes {
            self.events.push(Event::Voted {
                instance,
                round,
                node: message.sender,
                value: message.value,
            });
        }
        let inboxes = self.bus.deliver(&votes, round, MessageKind::Vote, &directives);

        // tally phase
        let mut fresh: Vec<(FinalizationRecord, u64)> = Vec::new();
        for (node, inbox) in self.nodes.iter_mut().zip(&inboxes) {
            if let Some(record) = node.ingest_votes(inbox, round) {
                fresh.push((record, node.vote_count(record.value)));
            }
        }
        let sent_at = round.inner() * TICKS_PER_ROUND + COMMIT_TICK;
        let mut announcements = Vec::new();
        for (record, count) in fresh {
            if count < self.config.quorum_size {
                return Err(ProtocolViolation::CommitWithoutQuorum {
                    node: record.node,
                    instance,
                    value: record.value,
                    count,
                    quorum: self.config.quorum_size,
                });
            }
            if !self.finalized.insert((record.node, instance)) {
                return Err(ProtocolViolation::DoubleCommit {
                    node: record.node,
                    instance,
                });
            }
            debug!(
                "node {} finalized {} in round {round} of instance {instance}",
                record.node, record.value
            );
            self.events.push(Event::Committed(record));
            if let Some(evidence) = self.monitor.observe(record) {
                warn!(
                    "safety violation in instance {instance}: node {} finalized {} against node {} holding {}",
                    evidence.second.node,
                    evidence.second.value,
                    evidence.first.node,
                    evidence.first.value,
                );
                self.events.push(Event::SafetyViolation(evidence));
            }
            match directives[record.node as usize] {
                BehaviorDirective::Silent => {}
                _ => announcements.push(Message::commit(
                    record.node,
                    instance,
                    round,
                    record.value,
                    sent_at,
                )),
            }
        }
        let inboxes = self
            .bus
            .deliver(&announcements, round, MessageKind::Commit, &directives);
        for (node, inbox) in self.nodes.iter_mut().zip(&inboxes) {
            node.observe_commits(inbox);
        }
        Ok(())
    }

    fn all_honest_committed(&self) -> bool {
        self.nodes
            .iter()
            .filter(|node| node.is_honest())
            .all(NodeState::is_committed)
    }
}
