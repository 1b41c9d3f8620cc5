//! Leader selection (component D): sorted-reveal-hash beacon.
//!
//! Reveals are sorted by `node_id` ascending, concatenated, and hashed to
//! produce a beacon. The beacon normalizes to `x ∈ [0,1)`; if `x` exceeds
//! `1/difficulty` the round has no winner (it still finalizes — the
//! caller is responsible for extending). Otherwise the winner is picked
//! deterministically from the sorted eligible-node list by index
//! `⌊x · |eligible_nodes|⌋`.

use qnet_core::hash::hash_to_unit_interval;
use sha3::{Digest, Sha3_256};

/// Computes the round beacon from sorted `(node_id, revealed_value)` pairs.
pub fn compute_beacon(reveals: &[(String, String)]) -> [u8; 32] {
    let mut sorted = reveals.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha3_256::new();
    for (_, value) in &sorted {
        hasher.update(value.as_bytes());
    }
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Selects the round's leader given reveals and the sorted eligible-node
/// list. Returns `None` if `x > 1/difficulty` (no winner this round).
pub fn select_leader(
    reveals: &[(String, String)],
    eligible_nodes_sorted: &[String],
    difficulty: u64,
) -> Option<String> {
    if eligible_nodes_sorted.is_empty() || reveals.is_empty() || difficulty == 0 {
        return None;
    }

    let beacon = compute_beacon(reveals);
    let x = hash_to_unit_interval(&beacon);
    let threshold = 1.0 / difficulty as f64;

    if x > threshold {
        return None;
    }

    let index = ((x * eligible_nodes_sorted.len() as f64).floor() as usize)
        .min(eligible_nodes_sorted.len() - 1);
    Some(eligible_nodes_sorted[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_is_order_independent_of_input_slice() {
        let reveals_a = vec![("b".to_string(), "B".to_string()), ("a".to_string(), "A".to_string())];
        let reveals_b = vec![("a".to_string(), "A".to_string()), ("b".to_string(), "B".to_string())];
        assert_eq!(compute_beacon(&reveals_a), compute_beacon(&reveals_b));
    }

    #[test]
    fn difficulty_one_always_has_a_winner() {
        let reveals = vec![("n1".to_string(), "A".to_string()), ("n2".to_string(), "B".to_string())];
        let eligible = vec!["n1".to_string(), "n2".to_string()];
        assert!(select_leader(&reveals, &eligible, 1).is_some());
    }

    #[test]
    fn huge_difficulty_usually_yields_no_winner() {
        let reveals = vec![("n1".to_string(), "A".to_string()), ("n2".to_string(), "B".to_string())];
        let eligible = vec!["n1".to_string(), "n2".to_string()];
        // threshold = 1/10000, essentially never satisfied by this beacon
        let result = select_leader(&reveals, &eligible, 10_000);
        let beacon = compute_beacon(&reveals);
        let x = hash_to_unit_interval(&beacon);
        assert_eq!(result.is_some(), x <= 1.0 / 10_000.0);
    }

    #[test]
    fn empty_eligible_set_has_no_winner() {
        let reveals = vec![("n1".to_string(), "A".to_string())];
        assert_eq!(select_leader(&reveals, &[], 1), None);
    }
}
