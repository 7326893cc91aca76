// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Messages exchanged between simulated nodes.

use serde::{Deserialize, Serialize};

use crate::types::{Round, Value};
use crate::{InstanceId, NodeId};

/// A message authored by one node and broadcast to all nodes.
///
/// Messages are immutable values. An equivocating sender authors one message
/// per conflicting value instead of mutating anything in flight, so two
/// deliveries of the same message are always byte-identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Authoring node.
    pub sender: NodeId,
    /// Consensus instance this message belongs to.
    pub instance: InstanceId,
    /// Round in which the message was authored.
    pub round: Round,
    /// Protocol phase this message belongs to.
    pub kind: MessageKind,
    /// Value being proposed, voted for, or committed.
    pub value: Value,
    /// Logical tick at which the message was sent.
    pub sent_at: u64,
}

/// The protocol phases a message can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A proposer offering a value for the instance.
    Propose,
    /// A vote for a value in the current round.
    Vote,
    /// An announcement that the sender finalized a value.
    Commit,
}

impl Message {
    /// Creates a new proposal message.
    #[must_use]
    pub const fn propose(
        sender: NodeId,
        instance: InstanceId,
        round: Round,
        value: Value,
        sent_at: u64,
    ) -> Self {
        Self::new(sender, instance, round, MessageKind::Propose, value, sent_at)
    }

    /// Creates a new vote message.
    #[must_use]
    pub const fn vote(
        sender: NodeId,
        instance: InstanceId,
        round: Round,
        value: Value,
        sent_at: u64,
    ) -> Self {
        Self::new(sender, instance, round, MessageKind::Vote, value, sent_at)
    }

    /// Creates a new commit announcement.
    #[must_use]
    pub const fn commit(
        sender: NodeId,
        instance: InstanceId,
        round: Round,
        value: Value,
        sent_at: u64,
    ) -> Self {
        Self::new(sender, instance, round, MessageKind::Commit, value, sent_at)
    }

    const fn new(
        sender: NodeId,
        instance: InstanceId,
        round: Round,
        kind: MessageKind,
        value: Value,
        sent_at: u64,
    ) -> Self {
        Self {
            sender,
            instance,
            round,
            kind,
            value,
            sent_at,
        }
    }

    /// Returns `true` iff this is a proposal.
    #[must_use]
    pub const fn is_propose(&self) -> bool {
        matches!(self.kind, MessageKind::Propose)
    }

    /// Returns `true` iff this is a vote.
    #[must_use]
    pub const fn is_vote(&self) -> bool {
        matches!(self.kind, MessageKind::Vote)
    }

    /// Returns `true` iff this is a commit announcement.
    #[must_use]
    pub const fn is_commit(&self) -> bool {
        matches!(self.kind, MessageKind::Commit)
    }
}
