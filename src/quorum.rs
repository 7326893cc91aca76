// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Quorum laws for flexible fault and quorum assumptions.
//!
//! Classical BFT fixes `n = 3f + 1` and quorums of `2f + 1`. Here both the
//! fault bound `f` and the quorum size are free parameters, and this module
//! holds the two laws any safe choice must satisfy:
//!
//! - fault exclusion: `quorum + f <= n`, so a quorum can always be assembled
//!   from honest nodes alone;
//! - intersection: `2 * quorum > n + f`, so any two quorums overlap in more
//!   than `f` nodes and therefore share at least one honest node.
//!
//! Everything in this module is pure; the [`ConsensusEngine`] consults it at
//! configuration time and tests consult it to predict run outcomes.
//!
//! [`ConsensusEngine`]: crate::consensus::ConsensusEngine

use thiserror::Error;

/// Violations of the quorum laws, reported by [`validate`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum QuorumViolation {
    #[error("quorum of {quorum} cannot form from honest nodes alone ({n} nodes, {f} faults)")]
    FaultExclusion { n: u64, f: u64, quorum: u64 },
    #[error("two quorums of {quorum} among {n} nodes need not share an honest node under {f} faults")]
    Intersection { n: u64, f: u64, quorum: u64 },
}

/// Returns the smallest quorum size satisfying the intersection law,
/// `floor((n + f) / 2) + 1`.
///
/// For `n > 3f` this choice also satisfies fault exclusion; otherwise no
/// quorum size satisfies both laws.
#[must_use]
pub const fn classical_quorum(n: u64, f: u64) -> u64 {
    (n + f) / 2 + 1
}

/// Returns the number of nodes any two quorums of size `quorum` must share.
///
/// Two subsets of size `quorum` among `n` nodes overlap in at least
/// `2 * quorum - n` nodes (zero if they need not overlap at all).
#[must_use]
pub const fn guaranteed_overlap(n: u64, quorum: u64) -> u64 {
    quorum.saturating_mul(2).saturating_sub(n)
}

/// Checks both quorum laws for the given parameters.
///
/// # Errors
///
/// Returns the first violated law, fault exclusion before intersection.
pub fn validate(n: u64, f: u64, quorum: u64) -> Result<(), QuorumViolation> {
    if quorum.saturating_add(f) > n {
        return Err(QuorumViolation::FaultExclusion { n, f, quorum });
    }
    if quorum.saturating_mul(2) <= n.saturating_add(f) {
        return Err(QuorumViolation::Intersection { n, f, quorum });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_sizes() {
        assert_eq!(classical_quorum(4, 1), 3);
        assert_eq!(classical_quorum(7, 2), 5);
        assert_eq!(classical_quorum(1, 0), 1);
        for f in 0..10 {
            let n = 3 * f + 1;
            assert_eq!(classical_quorum(n, f), 2 * f + 1);
            assert_eq!(validate(n, f, classical_quorum(n, f)), Ok(()));
        }
    }

    #[test]
    fn validate_matches_closed_form() {
        for n in 1..=15u64 {
            for f in 0..n {
                for quorum in 1..=n {
                    let ok = validate(n, f, quorum).is_ok();
                    let expected = 2 * quorum > n + f && quorum + f <= n;
                    assert_eq!(ok, expected, "n={n} f={f} quorum={quorum}");
                }
            }
        }
    }

    #[test]
    fn reports_violated_law() {
        assert!(matches!(
            validate(4, 1, 2),
            Err(QuorumViolation::Intersection { .. })
        ));
        assert!(matches!(
            validate(4, 2, 3),
            Err(QuorumViolation::FaultExclusion { .. })
        ));
    }

    #[test]
    fn overlap_law_brute_force() {
        // check `guaranteed_overlap` against all pairs of quorum-sized subsets
        for n in 1..=8u32 {
            for quorum in 1..=n {
                let masks = (0u32..1 << n)
                    .filter(|m| m.count_ones() == quorum)
                    .collect::<Vec<_>>();
                let mut min_overlap = quorum;
                for a in &masks {
                    for b in &masks {
                        min_overlap = min_overlap.min((a & b).count_ones());
                    }
                }
                assert_eq!(
                    u64::from(min_overlap),
                    guaranteed_overlap(n.into(), quorum.into()),
                    "n={n} quorum={quorum}"
                );
            }
        }
    }

    #[test]
    fn no_valid_quorum_beyond_third() {
        // with f >= n / 3 the two laws become mutually exclusive
        for n in 1..=30u64 {
            for f in n.div_ceil(3)..n {
                for quorum in 1..=n {
                    assert!(validate(n, f, quorum).is_err());
                }
            }
        }
    }
}
