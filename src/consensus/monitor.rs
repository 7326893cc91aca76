// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Global safety observation.
//!
//! The monitor watches every finalization in the run from outside the
//! protocol. Disagreement between honest nodes is the finding this simulator
//! exists to surface, so it is recorded as evidence and the run carries on;
//! only internal engine contract breaches abort a run.
//!
//! Byzantine nodes finalizing garbage is expected under attack and never
//! counts as a violation, but it is tallied separately so a report shows how
//! much of the damage stayed contained to the adversary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InstanceId;
use crate::event::FinalizationRecord;
use crate::types::Value;

/// Evidence that safety broke: two honest finalizations of different values
/// in the same instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvidence {
    /// Instance in which the conflict happened.
    pub instance: InstanceId,
    /// The earlier of the two conflicting finalizations.
    pub first: FinalizationRecord,
    /// The finalization that exposed the conflict.
    pub second: FinalizationRecord,
}

/// Watches all finalizations of a run for honest disagreement.
pub struct SafetyMonitor {
    /// Honesty per node id.
    honest: Vec<bool>,
    /// First honest finalization seen per value per instance.
    finalized: BTreeMap<InstanceId, BTreeMap<Value, FinalizationRecord>>,
    violations: Vec<ViolationEvidence>,
    stalls: Vec<InstanceId>,
    byzantine_finalizations: u64,
}

impl SafetyMonitor {
    /// Creates a monitor knowing which nodes are honest.
    #[must_use]
    pub fn new(honest: Vec<bool>) -> Self {
        Self {
            honest,
            finalized: BTreeMap::new(),
            violations: Vec::new(),
            stalls: Vec::new(),
            byzantine_finalizations: 0,
        }
    }

    /// Files one finalization.
    ///
    /// Returns evidence iff the record is an honest finalization of a value
    /// no honest node had finalized in this instance before, conflicting
    /// with one an honest node had. Repeat finalizations of an already
    /// conflicting value produce no further evidence.
    pub fn observe(&mut self, record: FinalizationRecord) -> Option<ViolationEvidence> {
        if !self.honest[record.node as usize] {
            self.byzantine_finalizations += 1;
            return None;
        }
        let per_value = self.finalized.entry(record.instance).or_default();
        let new_value = !per_value.contains_key(&record.value);
        per_value.entry(record.value).or_insert(record);
        if !new_value {
            return None;
        }
        let conflicting = per_value
            .values()
            .find(|earlier| earlier.value != record.value)
            .copied()?;
        let evidence = ViolationEvidence {
            instance: record.instance,
            first: conflicting,
            second: record,
        };
        self.violations.push(evidence);
        Some(evidence)
    }

    /// Records that an instance ended with at least one honest node
    /// uncommitted.
    pub fn record_stall(&mut self, instance: InstanceId) {
        self.stalls.push(instance);
    }

    /// Returns `true` iff any violation has been filed so far.
    #[must_use]
    pub fn violated(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Consumes the monitor into the final report.
    #[must_use]
    pub fn into_report(
        self,
        total_rounds: u64,
        total_instances: u64,
        equivocations_observed: u64,
    ) -> SafetyReport {
        SafetyReport {
            violations: self.violations,
            stalls: self.stalls,
            total_rounds,
            total_instances,
            byzantine_finalizations: self.byzantine_finalizations,
            equivocations_observed,
        }
    }
}

/// Aggregate findings of a finished run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyReport {
    /// All detected honest conflicts, in detection order.
    pub violations: Vec<ViolationEvidence>,
    /// Instances in which at least one honest node stalled.
    pub stalls: Vec<InstanceId>,
    /// Rounds executed across the whole run.
    pub total_rounds: u64,
    /// Instances executed.
    pub total_instances: u64,
    /// Finalizations by byzantine nodes. Expected under attack, never a
    /// violation by itself.
    pub byzantine_finalizations: u64,
    /// Distinct (observer, equivocator) pairs noticed during the run.
    pub equivocations_observed: u64,
}

impl SafetyReport {
    /// Returns `true` iff no two honest nodes finalized conflicting values.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns `true` iff every instance committed on every honest node.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.stalls.is_empty()
    }

    /// The first detected violation, if any.
    #[must_use]
    pub fn first_violation(&self) -> Option<&ViolationEvidence> {
        self.violations.first()
    }
}

impl fmt::Display for SafetyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} instances over {} rounds",
            self.total_instances, self.total_rounds
        )?;
        match self.first_violation() {
            Some(evidence) => writeln!(
                f,
                "safety:   VIOLATED in instance {} (node {} finalized {}, node {} finalized {})",
                evidence.instance,
                evidence.first.node,
                evidence.first.value,
                evidence.second.node,
                evidence.second.value,
            )?,
            None => writeln!(f, "safety:   ok")?,
        }
        if self.stalls.is_empty() {
            writeln!(f, "liveness: ok")?;
        } else {
            writeln!(f, "liveness: {} stalled instances {:?}", self.stalls.len(), self.stalls)?;
        }
        write!(
            f,
            "byzantine finalizations: {}, equivocations observed: {}",
            self.byzantine_finalizations, self.equivocations_observed
        )
    }
}
