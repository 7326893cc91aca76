// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

use flexquorum::{
    ByzantineStrategy, ConfigError, ConsensusEngine, DeliveryOrder, Event, FinalizationRecord,
    QuorumViolation, Round, RunConfig, RunOutput, Value,
};

fn run(config: RunConfig) -> RunOutput {
    ConsensusEngine::new(config).unwrap().run().unwrap()
}

fn commits(output: &RunOutput) -> Vec<FinalizationRecord> {
    output
        .events
        .iter()
        .filter_map(|event| match event {
            Event::Committed(record) => Some(*record),
            _ => None,
        })
        .collect()
}

#[test]
fn honest_nodes_always_agree() {
    for num_nodes in [3, 4, 5, 7, 9] {
        let output = run(RunConfig::classical(num_nodes, 0).with_instances(3));
        assert!(output.report.is_safe());
        for instance in 0..3 {
            let values: Vec<Value> = commits(&output)
                .iter()
                .filter(|record| record.instance == instance)
                .map(|record| record.value)
                .collect();
            assert_eq!(values.len(), num_nodes as usize);
            assert!(
                values.windows(2).all(|w| w[0] == w[1]),
                "{num_nodes} nodes disagreed in instance {instance}"
            );
        }
    }
}

#[test]
fn single_equivocating_voter_cannot_split_a_sound_quorum() {
    let config = RunConfig::classical(4, 1).with_byzantine(3, ByzantineStrategy::Equivocate);
    let output = run(config);

    // the three honest votes alone complete the quorum of 3
    let records = commits(&output);
    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record.value, Value::proposal(0, 0));
        assert_eq!(record.round, Round::zero());
    }
    assert!(output.report.is_safe() && output.report.is_live());
    assert_eq!(output.report.total_rounds, 1);
    assert_eq!(output.report.byzantine_finalizations, 1);
    assert_eq!(output.report.equivocations_observed, 1);
}

#[test]
fn colluding_equivocators_cannot_break_a_sound_quorum() {
    // nodes 5 and 6 share one equivocation pair per instance; once the
    // rotation reaches them the network splits 3 against 2 and the instance
    // stalls, but the three commits that do happen all agree
    let config = RunConfig::classical(7, 2)
        .with_byzantine(5, ByzantineStrategy::Equivocate)
        .with_byzantine(6, ByzantineStrategy::Equivocate)
        .with_instances(6);
    let output = run(config);

    assert!(output.report.is_safe());
    assert_eq!(output.report.stalls, vec![5]);
    assert_eq!(output.report.total_rounds, 13);
    assert_eq!(output.report.total_instances, 6);

    let split_instance: Vec<FinalizationRecord> = commits(&output)
        .into_iter()
        .filter(|record| record.instance == 5)
        .collect();
    assert_eq!(split_instance.len(), 3);
    for record in &split_instance {
        assert!(record.node < 5, "only the lower split half can commit");
        assert_eq!(record.value, split_instance[0].value);
        assert_eq!(record.round, Round::new(5));
        assert!(record.value.is_adversarial());
    }

    // two equivocators finalizing five clean instances each
    assert_eq!(output.report.byzantine_finalizations, 10);
    assert_eq!(output.report.equivocations_observed, 2);
}

#[test]
fn undersized_quorum_is_split_by_an_equivocating_proposer() {
    // quorum 2 of 4 fails the intersection bound; the attack lands in the
    // first instance proposed by the corrupted node
    let config = RunConfig::new(4, 1, 2)
        .with_byzantine(3, ByzantineStrategy::Equivocate)
        .with_delivery(DeliveryOrder::AdversaryFirst)
        .with_instances(4)
        .with_unsafe_quorums();
    let output = run(config);

    assert!(!output.report.is_safe());
    assert_eq!(output.report.violations.len(), 1);
    let evidence = output.report.first_violation().unwrap();
    assert_eq!(evidence.instance, 3);
    assert_ne!(evidence.first.value, evidence.second.value);
    assert!(evidence.first.node < 3 && evidence.second.node < 3);

    let reported = output
        .events
        .iter()
        .find_map(|event| match event {
            Event::SafetyViolation(evidence) => Some(evidence),
            _ => None,
        })
        .unwrap();
    assert_eq!(reported, evidence);

    // every instance still terminated, disagreement is not a stall
    assert!(output.report.is_live());
    assert_eq!(output.report.byzantine_finalizations, 4);
}

#[test]
fn unsound_quorums_are_rejected_up_front() {
    let intersection = ConsensusEngine::new(RunConfig::new(4, 1, 2)).err();
    assert_eq!(
        intersection,
        Some(ConfigError::UnsafeQuorum(QuorumViolation::Intersection {
            n: 4,
            f: 1,
            quorum: 2,
        }))
    );

    let exclusion = ConsensusEngine::new(RunConfig::new(5, 3, 4)).err();
    assert_eq!(
        exclusion,
        Some(ConfigError::UnsafeQuorum(QuorumViolation::FaultExclusion {
            n: 5,
            f: 3,
            quorum: 4,
        }))
    );

    assert!(ConsensusEngine::new(RunConfig::new(4, 1, 2).with_unsafe_quorums()).is_ok());
}

#[test]
fn fault_assumption_caps_assignments() {
    let config = RunConfig::classical(7, 1)
        .with_byzantine(5, ByzantineStrategy::Silent)
        .with_byzantine(6, ByzantineStrategy::Silent);
    assert_eq!(
        ConsensusEngine::new(config.clone()).err(),
        Some(ConfigError::TooManyByzantine {
            actual: 2,
            assumed: 1,
        })
    );

    // waived, the run proceeds; the five honest nodes still assemble the
    // quorum of five on their own
    let output = run(config.with_unsafe_quorums().with_instances(2));
    assert!(output.report.is_safe());
    assert!(output.report.is_live());
    assert_eq!(output.report.total_instances, 2);
    assert_eq!(output.report.byzantine_finalizations, 4);
}
