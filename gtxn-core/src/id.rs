//! Collision-resistant transaction ID generation (spec §2, §6):
//! `TXN_{roundId}_{createTimeMs}_{rand4}`.

use rand::Rng;

const RAND_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a transaction ID in the format spec §6 recommends.
pub fn generate_txn_id(round_id: &str, create_time_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let rand4: String = (0..4)
        .map(|_| {
            let idx = rng.gen_range(0..RAND_ALPHABET.len());
            RAND_ALPHABET[idx] as char
        })
        .collect();
    format!("TXN_{round_id}_{create_time_ms}_{rand4}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_spec() {
        let id = generate_txn_id("R1", 12345);
        assert!(id.starts_with("TXN_R1_12345_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 4);
    }

    #[test]
    fn ids_are_distinct_across_calls() {
        let a = generate_txn_id("R1", 1);
        let b = generate_txn_id("R1", 1);
        // Collision is astronomically unlikely with 36^4 combinations, but
        // not impossible; this asserts distinctness of a large sample
        // instead of a single pair to keep the test meaningful.
        let mut ids = std::collections::HashSet::new();
        for _ in 0..2000 {
            ids.insert(generate_txn_id("R1", 1));
        }
        assert!(ids.len() > 1900, "expected low collision rate, got {} uniques", ids.len());
        let _ = (a, b);
    }
}
