// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Message bus delivering broadcasts under adversarial control.
//!
//! The bus is the network model of the simulator. Within a phase, every
//! authored message is delivered to every node (sender included) at a
//! delivery step inside that phase; deliveries sharing a step reach a node
//! together and are indistinguishable in arrival order. Honest traffic always
//! lands in the phase it was sent. The adversary controls relative ordering
//! through [`DeliveryOrder`], may hold byzantine messages back for later
//! rounds ([`BehaviorDirective::Delay`]), routes equivocated messages to
//! disjoint halves of the network, and may duplicate byzantine traffic.
//! Nothing is ever lost, only reordered within its phase or delayed whole
//! rounds, and nothing honest moves across a round boundary.
//!
//! Inboxes are sorted by `(step, sender, value)`, which makes delivery
//! deterministic given the run seed.

use std::collections::BTreeMap;

use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::NodeId;
use crate::consensus::{Message, MessageKind};
use crate::faults::BehaviorDirective;
use crate::types::{Round, Value};

/// Highest delivery step jittered honest traffic may land on.
const MAX_DELIVERY_STEP: u64 = 2;

/// Probability of duplicating a byzantine message under
/// [`DeliveryOrder::Jittered`].
const DUPLICATION_PROBABILITY: f64 = 0.125;

/// Relative delivery order of messages within a phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Everything arrives in one delivery step.
    #[default]
    Uniform,
    /// Byzantine traffic arrives one step before honest cross-traffic.
    ///
    /// This is the adversary's favourite schedule: its messages are counted
    /// before any honest correction can arrive.
    AdversaryFirst,
    /// Honest cross-traffic lands on a seeded random step and byzantine
    /// messages are occasionally duplicated.
    Jittered,
}

/// A single message delivery into a node's inbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Delivery step within the receiving phase.
    pub step: u64,
    /// The delivered message.
    pub message: Message,
}

/// All deliveries into one node for one phase, in delivery order.
pub type Inbox = Vec<Delivery>;

/// Broadcast network with adversarial scheduling.
pub struct MessageBus {
    num_nodes: u64,
    order: DeliveryOrder,
    rng: SmallRng,
    /// Deliveries held back by [`BehaviorDirective::Delay`], keyed by the
    /// round and phase in which they surface.
    parked: BTreeMap<(Round, MessageKind), Vec<(NodeId, Message)>>,
}

impl MessageBus {
    /// Creates a new bus for the given number of nodes.
    ///
    /// The rng must be derived from the run seed; it is only consumed under
    /// [`DeliveryOrder::Jittered`].
    #[must_use]
    pub fn new(num_nodes: u64, order: DeliveryOrder, rng: SmallRng) -> Self {
        Self {
            num_nodes,
            order,
            rng,
            parked: BTreeMap::new(),
        }
    }

    /// Number of deliveries currently parked for later rounds.
    #[must_use]
    pub fn parked_deliveries(&self) -> usize {
        self.parked.values().map(Vec::len).sum()
    }

    /// Delivers one phase's outbound messages, plus any parked deliveries
    /// that are due, into per-node inboxes.
    ///
    /// `directives` holds the current round's directive per sender and
    /// controls routing. Callers must pass `outbound` in authoring order
    /// (node id order) so that rng consumption is reproducible.
    pub fn deliver(
        &mut self,
        outbound: &[Message],
        round: Round,
        phase: MessageKind,
        directives: &[BehaviorDirective],
    ) -> Vec<Inbox> {
        let mut inboxes = vec![Vec::new(); self.num_nodes as usize];

        // delayed traffic surfaces first, at step 0
        if let Some(due) = self.parked.remove(&(round, phase)) {
            for (recipient, message) in due {
                inboxes[recipient as usize].push(Delivery { step: 0, message });
            }
        }

        for &message in outbound {
            debug_assert_eq!(message.kind, phase);
            match directives[message.sender as usize] {
                BehaviorDirective::Normal => self.route_honest(&mut inboxes, message),
                BehaviorDirective::Equivocate(a, b) => {
                    self.route_split(&mut inboxes, message, a, b);
                }
                BehaviorDirective::Delay(rounds) if rounds > 0 => {
                    let due = (round.offset(rounds), message.kind);
                    let parked = self.parked.entry(due).or_default();
                    for recipient in 0..self.num_nodes {
                        parked.push((recipient, message));
                    }
                }
                // a silent sender authors nothing; nothing sensible to do
                // with its traffic but pass it through
                BehaviorDirective::Silent
                | BehaviorDirective::Delay(_)
                | BehaviorDirective::Conflicting(_) => {
                    self.route_adversarial(&mut inboxes, message);
                }
            }
        }

        for inbox in &mut inboxes {
            inbox.sort_by_key(|d| (d.step, d.message.sender, d.message.value));
        }
        inboxes
    }

    fn route_honest(&mut self, inboxes: &mut [Inbox], message: Message) {
        for recipient in 0..self.num_nodes {
            let step = if recipient == message.sender {
                0
            } else {
                match self.order {
                    DeliveryOrder::Uniform => 0,
                    DeliveryOrder::AdversaryFirst => 1,
                    DeliveryOrder::Jittered => self.rng.random_range(0..=MAX_DELIVERY_STEP),
                }
            };
            inboxes[recipient as usize].push(Delivery { step, message });
        }
    }

    /// Routes an equivocated message to its half of the network.
    ///
    /// The variant carrying `a` goes to the lower half of node ids, the one
    /// carrying `b` to the upper half. The sender hears both. Messages
    /// carrying neither value (commit announcements) broadcast normally.
    fn route_split(&mut self, inboxes: &mut [Inbox], message: Message, a: Value, b: Value) {
        let half = self.num_nodes / 2;
        for recipient in 0..self.num_nodes {
            let addressed = if message.value == a {
                recipient < half
            } else if message.value == b {
                recipient >= half
            } else {
                true
            };
            if addressed || recipient == message.sender {
                self.push_adversarial(inboxes, recipient, message);
            }
        }
    }

    fn route_adversarial(&mut self, inboxes: &mut [Inbox], message: Message) {
        for recipient in 0..self.num_nodes {
            self.push_adversarial(inboxes, recipient, message);
        }
    }

    /// Byzantine traffic always lands on step 0; under jitter it is
    /// sometimes delivered twice.
    fn push_adversarial(&mut self, inboxes: &mut [Inbox], recipient: NodeId, message: Message) {
        inboxes[recipient as usize].push(Delivery { step: 0, message });
        if self.order == DeliveryOrder::Jittered && self.rng.random_bool(DUPLICATION_PROBABILITY) {
            let step = self.rng.random_range(1..=MAX_DELIVERY_STEP);
            inboxes[recipient as usize].push(Delivery { step, message });
        }
    }
}
