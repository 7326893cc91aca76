// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Flexquorum: Byzantine Consensus Simulation under Flexible Quorum Assumptions
//!
//! Research simulator probing where BFT safety breaks when the quorum size is
//! decoupled from the classical `2f+1` choice. A run executes a configurable
//! number of single-value consensus instances over closed, synchronous rounds
//! with injected byzantine behavior, and reports safety violations and
//! liveness stalls as findings rather than errors.
//!
//! The library splits into a few components:
//! - [`quorum`] checks the two safety laws a `(n, f, quorum)` triple must obey.
//! - [`config`] describes a run and validates it up front.
//! - [`faults`] turns per-node byzantine strategies into per-round directives.
//! - [`bus`] models the network, including adversarial delivery schedules.
//! - [`consensus`] drives the rounds and watches safety from the outside.
//! - [`event`] is the deterministic, serializable trace a run leaves behind.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod bus;
pub mod config;
pub mod consensus;
pub mod event;
pub mod faults;
pub mod logging;
pub mod quorum;
pub mod types;

use static_assertions::const_assert_eq;

pub use self::bus::{Delivery, DeliveryOrder, MessageBus};
pub use self::config::{ByzantineAssignment, ConfigError, RunConfig};
pub use self::consensus::{
    ConsensusEngine, Message, MessageKind, ProtocolViolation, RunOutput, SafetyMonitor,
    SafetyReport, ViolationEvidence,
};
pub use self::event::{Event, FinalizationRecord};
pub use self::faults::{BehaviorDirective, ByzantineStrategy, FaultInjector, Honesty};
pub use self::quorum::QuorumViolation;
pub use self::types::{Round, Value};

// NOTE: In many places we assume that `usize` is 64 bits wide.
// So, for now, we only support 64-bit architectures.
const_assert_eq!(std::mem::size_of::<usize>(), 8);

/// Node ID number type.
pub type NodeId = u64;
/// Consensus instance number type.
pub type InstanceId = u64;
