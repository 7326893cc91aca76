// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

use flexquorum::{
    ByzantineStrategy, ConsensusEngine, Event, FinalizationRecord, Round, RunConfig, RunOutput,
    Value,
};

fn run(config: RunConfig) -> RunOutput {
    ConsensusEngine::new(config).unwrap().run().unwrap()
}

fn commits_of(output: &RunOutput, instance: u64) -> Vec<FinalizationRecord> {
    output
        .events
        .iter()
        .filter_map(|event| match event {
            Event::Committed(record) if record.instance == instance => Some(*record),
            _ => None,
        })
        .collect()
}

#[test]
fn only_correct_nodes() {
    for num_nodes in 1..=8 {
        let output = run(RunConfig::classical(num_nodes, 0));
        assert!(output.report.is_live());
        assert_eq!(output.report.total_rounds, 1);
        let records = commits_of(&output, 0);
        assert_eq!(records.len(), num_nodes as usize);
        for record in records {
            assert_eq!(record.value, Value::proposal(0, 0));
            assert_eq!(record.round, Round::zero());
        }
    }
}

#[test]
fn unused_fault_tolerance_costs_nothing() {
    // provisioned for one fault, facing none: a single round, as without
    let output = run(RunConfig::classical(4, 1));

    assert!(output.report.is_live());
    assert!(output.report.is_safe());
    assert_eq!(output.report.total_rounds, 1);
    assert_eq!(output.report.byzantine_finalizations, 0);
    let records = commits_of(&output, 0);
    assert_eq!(records.len(), 4);
    for record in records {
        assert_eq!(record.value, Value::proposal(0, 0));
        assert_eq!(record.round, Round::zero());
    }
}

#[test]
fn single_silent_leader() {
    // node 3 never proposes, so instance 3 loses one round to it and
    // finishes under the next proposer in the rotation
    let config = RunConfig::classical(4, 1)
        .with_byzantine(3, ByzantineStrategy::Silent)
        .with_instances(4);
    let output = run(config);

    assert!(output.report.is_live());
    assert_eq!(output.report.total_rounds, 5);
    let records = commits_of(&output, 3);
    assert_eq!(records.len(), 4);
    for record in records {
        assert_eq!(record.value, Value::proposal(3, 0));
        assert_eq!(record.round, Round::new(4));
    }
    // a silent node still hears quorums and finalizes in every instance
    assert_eq!(output.report.byzantine_finalizations, 4);
}

#[test]
fn two_silent_leaders_in_a_row() {
    // instance 5 hits the silent proposers 5 and 6 back to back and
    // completes in the third round, the worst case under two faults
    let config = RunConfig::classical(7, 2)
        .with_byzantine(5, ByzantineStrategy::Silent)
        .with_byzantine(6, ByzantineStrategy::Silent)
        .with_instances(7);
    let output = run(config);

    assert!(output.report.is_live());
    assert_eq!(output.report.total_rounds, 9);
    for instance in 0..7 {
        assert_eq!(commits_of(&output, instance).len(), 7);
    }
    for record in commits_of(&output, 5) {
        assert_eq!(record.value, Value::proposal(5, 0));
        assert_eq!(record.round, Round::new(7));
    }
}

#[test]
fn too_many_silent_nodes() {
    // two of five silent leaves three honest votes against a quorum of four
    let config = RunConfig::classical(5, 1)
        .with_byzantine(3, ByzantineStrategy::Silent)
        .with_byzantine(4, ByzantineStrategy::Silent)
        .with_unsafe_quorums()
        .with_round_timeout(5);
    let output = run(config);

    assert!(!output.report.is_live());
    assert!(output.report.is_safe());
    assert_eq!(output.report.stalls, vec![0]);
    assert_eq!(output.report.total_rounds, 5);
    assert!(commits_of(&output, 0).is_empty());
    assert!(output.events.contains(&Event::Stalled { instance: 0 }));
}

#[test]
fn delayed_votes_still_count() {
    // with node 2 silent the quorum of three needs node 3, whose votes
    // trail two rounds behind; the vote sent in round 0 completes the
    // quorum when it surfaces in round 2
    let config = RunConfig::classical(4, 1)
        .with_byzantine(2, ByzantineStrategy::Silent)
        .with_byzantine(3, ByzantineStrategy::Delay { rounds: 2 })
        .with_unsafe_quorums();
    let output = run(config);

    assert!(output.report.is_live());
    assert!(output.report.is_safe());
    assert_eq!(output.report.total_rounds, 3);
    let records = commits_of(&output, 0);
    assert_eq!(records.len(), 4);
    for record in records {
        assert_eq!(record.value, Value::proposal(0, 0));
        assert_eq!(record.round, Round::new(2));
    }
    assert_eq!(output.report.byzantine_finalizations, 2);
}
