// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-instance vote accounting.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::NodeId;
use crate::types::Value;

/// Tracks the votes one node has seen for one consensus instance.
///
/// Voters are deduplicated per value, so re-broadcast and duplicated votes
/// are idempotent. An equivocating voter may appear under several values;
/// that is exactly the adversarial power whose limits the quorum laws bound,
/// so the tally counts the vote under every value and reports the
/// observation instead of refusing it.
#[derive(Clone, Debug)]
pub struct VoteTally {
    quorum: u64,
    /// Distinct voters seen per value.
    votes: BTreeMap<Value, BTreeSet<NodeId>>,
    /// All values each voter was seen voting for. Honest voters stay at one.
    voters: BTreeMap<NodeId, SmallVec<[Value; 2]>>,
}

/// Result of adding one vote to the tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TallyOutcome {
    /// The value that reached quorum with this vote, if any.
    pub newly_at_quorum: Option<Value>,
    /// `true` iff the voter was just seen spanning two values.
    pub equivocation: bool,
}

impl VoteTally {
    /// Creates an empty tally requiring `quorum` distinct voters per value.
    #[must_use]
    pub fn new(quorum: u64) -> Self {
        debug_assert!(quorum > 0);
        Self {
            quorum,
            votes: BTreeMap::new(),
            voters: BTreeMap::new(),
        }
    }

    /// The quorum size this tally was created with.
    #[must_use]
    pub const fn quorum(&self) -> u64 {
        self.quorum
    }

    /// Adds one vote, ignoring exact duplicates.
    pub fn add_vote(&mut self, voter: NodeId, value: Value) -> TallyOutcome {
        let mut outcome = TallyOutcome::default();
        if !self.votes.entry(value).or_default().insert(voter) {
            return outcome;
        }
        let values = self.voters.entry(voter).or_default();
        values.push(value);
        // flag the voter once, when it first spans two values
        outcome.equivocation = values.len() == 2;
        if self.count(value) == self.quorum {
            outcome.newly_at_quorum = Some(value);
        }
        outcome
    }

    /// Number of distinct voters seen for the given value.
    #[must_use]
    pub fn count(&self, value: Value) -> u64 {
        self.votes.get(&value).map_or(0, |voters| voters.len() as u64)
    }

    /// Returns `true` iff the given value has reached quorum.
    #[must_use]
    pub fn has_quorum(&self, value: Value) -> bool {
        self.count(value) >= self.quorum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_reported_exactly_once() {
        let mut tally = VoteTally::new(3);
        let value = Value::proposal(0, 0);
        assert_eq!(tally.add_vote(0, value).newly_at_quorum, None);
        assert_eq!(tally.add_vote(1, value).newly_at_quorum, None);
        assert_eq!(tally.add_vote(2, value).newly_at_quorum, Some(value));
        assert!(tally.has_quorum(value));
        // a fourth voter does not re-trigger the transition
        assert_eq!(tally.add_vote(3, value).newly_at_quorum, None);
        assert_eq!(tally.count(value), 4);
    }

    #[test]
    fn duplicate_votes_are_idempotent() {
        let mut tally = VoteTally::new(2);
        let value = Value::proposal(0, 0);
        tally.add_vote(0, value);
        for _ in 0..10 {
            let outcome = tally.add_vote(0, value);
            assert_eq!(outcome, TallyOutcome::default());
        }
        assert_eq!(tally.count(value), 1);
        assert!(!tally.has_quorum(value));
    }

    #[test]
    fn equivocating_voter_counts_under_both_values() {
        let mut tally = VoteTally::new(2);
        let a = Value::adversarial(0);
        let b = Value::adversarial(1);
        assert!(!tally.add_vote(7, a).equivocation);
        assert!(tally.add_vote(7, b).equivocation);
        // flagged only on the first conflicting value
        assert!(!tally.add_vote(7, Value::adversarial(2)).equivocation);
        assert_eq!(tally.count(a), 1);
        assert_eq!(tally.count(b), 1);
    }

    #[test]
    fn separate_values_reach_quorum_independently() {
        let mut tally = VoteTally::new(2);
        let a = Value::proposal(0, 0);
        let b = Value::adversarial(0);
        tally.add_vote(0, a);
        tally.add_vote(1, b);
        tally.add_vote(2, b);
        assert!(!tally.has_quorum(a));
        assert!(tally.has_quorum(b));
    }
}
