// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Observable events of a simulation run.
//!
//! The engine appends events in emission order: within a round first all
//! proposals, then all votes, then finalizations interleaved with any safety
//! violations they trigger. Runs with equal configurations and seeds produce
//! byte-identical event streams.

use serde::{Deserialize, Serialize};

use crate::consensus::monitor::ViolationEvidence;
use crate::types::{Round, Value};
use crate::{InstanceId, NodeId};

/// One node's irrevocable finalization of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationRecord {
    /// Node that finalized.
    pub node: NodeId,
    /// Instance the finalization belongs to.
    pub instance: InstanceId,
    /// Round in which quorum was reached.
    pub round: Round,
    /// The finalized value.
    pub value: Value,
}

/// A single observable step of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A proposer broadcast a proposal.
    Proposed {
        instance: InstanceId,
        round: Round,
        node: NodeId,
        value: Value,
    },
    /// A node cast a vote.
    Voted {
        instance: InstanceId,
        round: Round,
        node: NodeId,
        value: Value,
    },
    /// A node finalized a value.
    Committed(FinalizationRecord),
    /// An instance timed out with honest nodes left uncommitted.
    Stalled { instance: InstanceId },
    /// Two honest nodes finalized conflicting values in one instance.
    SafetyViolation(ViolationEvidence),
}

impl Event {
    /// The consensus instance this event belongs to.
    #[must_use]
    pub const fn instance(&self) -> InstanceId {
        match self {
            Self::Proposed { instance, .. } | Self::Voted { instance, .. } => *instance,
            Self::Committed(record) => record.instance,
            Self::Stalled { instance } => *instance,
            Self::SafetyViolation(evidence) => evidence.instance,
        }
    }

    /// The round this event was emitted in, where one applies.
    #[must_use]
    pub const fn round(&self) -> Option<Round> {
        match self {
            Self::Proposed { round, .. } | Self::Voted { round, .. } => Some(*round),
            Self::Committed(record) => Some(record.round),
            Self::Stalled { .. } | Self::SafetyViolation(_) => None,
        }
    }
}
