// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Defines the [`Value`] type.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{InstanceId, NodeId};

/// Number of low bits holding the proposer id in canonical proposal values.
const PROPOSER_BITS: u32 = 20;

/// Marker bit distinguishing fabricated adversarial values from canonical ones.
const ADVERSARIAL_BIT: u64 = 1 << 63;

/// Opaque consensus value identifier.
///
/// Values carry no payload, only identity and a total order. They come from
/// two disjoint namespaces: canonical values derived from `(instance,
/// proposer)`, which honest proposers offer, and adversarial values minted
/// from a nonce counter by the fault injector. Keeping the namespaces
/// disjoint means a fabricated value can never alias an honest proposal.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Value(u64);

impl Value {
    /// Creates a value with the given raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the canonical value an honest `proposer` offers for `instance`.
    #[must_use]
    pub const fn proposal(instance: InstanceId, proposer: NodeId) -> Self {
        debug_assert!(proposer < (1 << PROPOSER_BITS));
        debug_assert!(instance < (1 << (63 - PROPOSER_BITS)));
        Self((instance << PROPOSER_BITS) | proposer)
    }

    /// Returns the adversarial value for the given `nonce`.
    #[must_use]
    pub const fn adversarial(nonce: u64) -> Self {
        debug_assert!(nonce < ADVERSARIAL_BIT);
        Self(ADVERSARIAL_BIT | nonce)
    }

    /// Returns the inner `u64`.
    #[must_use]
    pub const fn inner(self) -> u64 {
        self.0
    }

    /// Returns `true` iff this value was minted by the fault injector.
    #[must_use]
    pub const fn is_adversarial(self) -> bool {
        self.0 & ADVERSARIAL_BIT != 0
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_adversarial() {
            write!(f, "x{}", self.0 & !ADVERSARIAL_BIT)
        } else {
            write!(f, "v{}", self.0)
        }
    }
}
