//! Classification of clients as active within a bucket

use std::collections::HashMap;

/// Default number of check-ins a client must exceed to count as active.
pub const MIN_ACTIVE: u64 = 3;

/// Whether a client with `hits` check-ins in a bucket is active. The comparison is strict.
pub fn is_active(hits: u64, threshold: u64) -> bool {
    hits > threshold
}

/// Number of clients in `hits_per_client` that are active under `threshold`.
pub fn count_active<K>(hits_per_client: &HashMap<K, u64>, threshold: u64) -> usize {
    hits_per_client
        .values()
        .filter(|&&hits| is_active(hits, threshold))
        .count()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{MIN_ACTIVE, count_active, is_active};

    #[test]
    fn threshold_is_strict() {
        assert!(is_active(4, MIN_ACTIVE));
        assert!(!is_active(3, MIN_ACTIVE));
        assert!(is_active(1, 0));
        assert!(!is_active(0, 0));
    }

    #[test]
    fn counts_only_active_clients() {
        let hits = HashMap::from([("a", 4), ("b", 3), ("c", 10), ("d", 1)]);
        assert_eq!(count_active(&hits, MIN_ACTIVE), 2);
        assert_eq!(count_active(&hits, 0), 4);
    }
}
