// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Defines the [`Round`] type.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Round number type.
///
/// Rounds are numbered globally across all consensus instances of a run,
/// so the rotating proposer keeps moving from one instance to the next.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Round(u64);

impl Round {
    /// Creates a new round with the given number.
    #[must_use]
    pub const fn new(round: u64) -> Self {
        Self(round)
    }

    /// Returns the first round of a run.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the inner `u64`.
    #[must_use]
    pub const fn inner(self) -> u64 {
        self.0
    }

    /// Returns the next round after `self`.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the round `rounds` rounds after `self`.
    #[must_use]
    pub const fn offset(&self, rounds: u64) -> Self {
        Self(self.0 + rounds)
    }

    /// Returns the rotating proposer for this round among `num_nodes` nodes.
    #[must_use]
    pub const fn proposer(&self, num_nodes: u64) -> NodeId {
        self.0 % num_nodes
    }

    /// Returns `true` iff this is the first round of a run.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Round {
    fn default() -> Self {
        Self::zero()
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
