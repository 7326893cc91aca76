// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-node protocol state machine.
//!
//! Honest behavior in one round: the designated proposer broadcasts its
//! locked value, or the canonical value of the instance if it never voted.
//! Every node votes for its locked value if it has one, otherwise for the
//! first proposal delivered this round, and locks what it voted for. A node
//! that sees `quorum` distinct voters behind one value finalizes it,
//! announces the commit, and stops participating in the instance. Votes are
//! tallied one delivery step at a time; if several values complete a quorum
//! in the same step, the smallest value wins the tie-break.
//!
//! Byzantine nodes run the same machinery but author messages according to
//! their [`BehaviorDirective`].

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::bus::Inbox;
use crate::consensus::Message;
use crate::consensus::tally::VoteTally;
use crate::event::FinalizationRecord;
use crate::faults::{BehaviorDirective, Honesty};
use crate::types::{Round, Value};
use crate::{InstanceId, NodeId};

/// Phases a node moves through within one consensus instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No proposal seen yet.
    Idle,
    /// A proposal for the instance was seen or authored.
    Proposed,
    /// A vote was cast; the node is locked on the voted value.
    Voted,
    /// A value was finalized; terminal for the instance.
    Committed,
    /// The instance timed out before this node committed; terminal.
    Stalled,
}

/// State of a single simulated node.
pub struct NodeState {
    id: NodeId,
    honesty: Honesty,
    quorum: u64,
    instance: InstanceId,
    phase: Phase,
    /// Value this node is locked on in the current instance.
    locked: Option<Value>,
    /// First proposal delivered in the current round, if any.
    fresh_proposal: Option<Value>,
    tally: VoteTally,
    committed: Option<FinalizationRecord>,
    /// Commit announcements observed from peers, keyed by instance and
    /// sender. Kept for the whole run as an audit trail.
    seen_commits: BTreeMap<(InstanceId, NodeId), Value>,
    /// Senders this node observed equivocating, over the whole run.
    equivocators_seen: BTreeSet<NodeId>,
}

impl NodeState {
    /// Creates a node in its initial state for instance 0.
    #[must_use]
    pub fn new(id: NodeId, honesty: Honesty, quorum: u64) -> Self {
        Self {
            id,
            honesty,
            quorum,
            instance: 0,
            phase: Phase::Idle,
            locked: None,
            fresh_proposal: None,
            tally: VoteTally::new(quorum),
            committed: None,
            seen_commits: BTreeMap::new(),
            equivocators_seen: BTreeSet::new(),
        }
    }

    /// Resets all per-instance state for the given instance.
    pub fn begin_instance(&mut self, instance: InstanceId) {
        self.instance = instance;
        self.phase = Phase::Idle;
        self.locked = None;
        self.fresh_proposal = None;
        self.tally = VoteTally::new(self.quorum);
        self.committed = None;
    }

    /// Produces this node's proposal messages for the round.
    ///
    /// Only called on the round's designated proposer.
    pub fn author_proposals(
        &mut self,
        round: Round,
        directive: BehaviorDirective,
        sent_at: u64,
    ) -> SmallVec<[Message; 2]> {
        let mut proposals = SmallVec::new();
        if self.is_committed() {
            return proposals;
        }
        match directive {
            BehaviorDirective::Normal | BehaviorDirective::Delay(_) => {
                let value = self
                    .locked
                    .unwrap_or_else(|| Value::proposal(self.instance, self.id));
                proposals.push(Message::propose(self.id, self.instance, round, value, sent_at));
            }
            BehaviorDirective::Equivocate(a, b) => {
                proposals.push(Message::propose(self.id, self.instance, round, a, sent_at));
                proposals.push(Message::propose(self.id, self.instance, round, b, sent_at));
            }
            BehaviorDirective::Silent => {}
            BehaviorDirective::Conflicting(value) => {
                proposals.push(Message::propose(self.id, self.instance, round, value, sent_at));
            }
        }
        if !proposals.is_empty() && self.phase == Phase::Idle {
            self.phase = Phase::Proposed;
        }
        proposals
    }

    /// Ingests the proposal-phase inbox.
    ///
    /// Remembers the first proposal of the round as the vote candidate and
    /// notes proposers caught offering two different values.
    pub fn observe_proposals(&mut self, inbox: &Inbox) {
        self.fresh_proposal = None;
        if self.is_committed() {
            return;
        }
        let mut offered: BTreeMap<NodeId, Value> = BTreeMap::new();
        for delivery in inbox {
            let message = delivery.message;
            debug_assert!(message.is_propose());
            if message.instance != self.instance {
                // late traffic from a finished instance
                continue;
            }
            match offered.get(&message.sender) {
                Some(&earlier) if earlier != message.value => {
                    self.note_equivocator(message.sender);
                }
                Some(_) => {}
                None => {
                    offered.insert(message.sender, message.value);
                }
            }
            if self.fresh_proposal.is_none() {
                self.fresh_proposal = Some(message.value);
                if self.phase == Phase::Idle {
                    self.phase = Phase::Proposed;
                }
            }
        }
    }

    /// Produces this node's vote messages for the round.
    ///
    /// Honest nodes vote their lock, or the round's first proposal if they
    /// never voted, and stay quiet if there is neither.
    pub fn author_votes(
        &mut self,
        round: Round,
        directive: BehaviorDirective,
        sent_at: u64,
    ) -> SmallVec<[Message; 2]> {
        let mut votes = SmallVec::new();
        if self.is_committed() {
            return votes;
        }
        match directive {
            BehaviorDirective::Normal | BehaviorDirective::Delay(_) => {
                if let Some(value) = self.locked.or(self.fresh_proposal) {
                    self.locked = Some(value);
                    votes.push(Message::vote(self.id, self.instance, round, value, sent_at));
                }
            }
            BehaviorDirective::Equivocate(a, b) => {
                votes.push(Message::vote(self.id, self.instance, round, a, sent_at));
                votes.push(Message::vote(self.id, self.instance, round, b, sent_at));
            }
            BehaviorDirective::Silent => {}
            BehaviorDirective::Conflicting(value) => {
                votes.push(Message::vote(self.id, self.instance, round, value, sent_at));
            }
        }
        if !votes.is_empty() {
            self.phase = Phase::Voted;
        }
        votes
    }

    /// Tallies the vote-phase inbox one delivery step at a time.
    ///
    /// Returns the finalization iff some value completed a quorum. Values
    /// completing a quorum in the same step tie-break to the smallest; a
    /// value completing in an earlier step beats any later one.
    pub fn ingest_votes(&mut self, inbox: &Inbox, round: Round) -> Option<FinalizationRecord> {
        if self.is_committed() {
            return None;
        }
        let mut index = 0;
        while index < inbox.len() {
            let step = inbox[index].step;
            let mut reached: SmallVec<[Value; 2]> = SmallVec::new();
            while index < inbox.len() && inbox[index].step == step {
                let message = inbox[index].message;
                index += 1;
                debug_assert!(message.is_vote());
                if message.instance != self.instance {
                    continue;
                }
                let outcome = self.tally.add_vote(message.sender, message.value);
                if outcome.equivocation {
                    self.note_equivocator(message.sender);
                }
                if let Some(value) = outcome.newly_at_quorum {
                    reached.push(value);
                }
            }
            if let Some(value) = reached.into_iter().min() {
                return Some(self.finalize(value, round));
            }
        }
        None
    }

    fn finalize(&mut self, value: Value, round: Round) -> FinalizationRecord {
        let record = FinalizationRecord {
            node: self.id,
            instance: self.instance,
            round,
            value,
        };
        self.locked = Some(value);
        self.committed = Some(record);
        self.phase = Phase::Committed;
        record
    }

    /// Records peer commit announcements.
    pub fn observe_commits(&mut self, inbox: &Inbox) {
        for delivery in inbox {
            let message = delivery.message;
            debug_assert!(message.is_commit());
            self.seen_commits
                .insert((message.instance, message.sender), message.value);
        }
    }

    /// Marks the node stalled if the instance ended without a commit.
    pub fn mark_stalled(&mut self) {
        if !self.is_committed() {
            self.phase = Phase::Stalled;
        }
    }

    fn note_equivocator(&mut self, sender: NodeId) {
        self.equivocators_seen.insert(sender);
    }

    /// This node's id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// This node's honesty assignment.
    #[must_use]
    pub const fn honesty(&self) -> Honesty {
        self.honesty
    }

    /// Returns `true` iff this node follows the protocol.
    #[must_use]
    pub const fn is_honest(&self) -> bool {
        self.honesty.is_honest()
    }

    /// Current phase within the instance.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The value this node is locked on, if any.
    #[must_use]
    pub const fn locked(&self) -> Option<Value> {
        self.locked
    }

    /// Returns `true` iff this node finalized the current instance.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// The finalization of the current instance, if reached.
    #[must_use]
    pub const fn committed(&self) -> Option<FinalizationRecord> {
        self.committed
    }

    /// Distinct voters this node has seen behind the given value.
    #[must_use]
    pub fn vote_count(&self, value: Value) -> u64 {
        self.tally.count(value)
    }

    /// Senders this node observed equivocating during the run.
    #[must_use]
    pub const fn equivocators_seen(&self) -> &BTreeSet<NodeId> {
        &self.equivocators_seen
    }

    /// Peer commit announcements observed during the run.
    #[must_use]
    pub const fn seen_commits(&self) -> &BTreeMap<(InstanceId, NodeId), Value> {
        &self.seen_commits
    }
}
