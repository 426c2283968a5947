//! Run-lifetime registry of every client seen so far

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::record::LogEntry;

/// Largest hit count reported by [`Registry::repeat_counts`].
pub const MAX_REPEAT: u64 = 7;

/// Everything known about one client across the whole run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub client_id: String,
    /// Number of check-ins, never zero
    pub hit_count: u64,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    /// Largest server count ever reported, zero without deployment metrics
    pub max_server_count: u64,
    /// Largest table count ever reported, zero without deployment metrics
    pub max_table_count: u64,
}

impl ClientRecord {
    /// A record for a client sighted for the first time on `day`.
    fn first_sighting(entry: &LogEntry, day: NaiveDate) -> Self {
        let metrics = entry.deployment_metrics.unwrap_or_default();
        ClientRecord {
            client_id: entry.client_id.clone(),
            hit_count: 1,
            first_seen: day,
            last_seen: day,
            max_server_count: metrics.server_count,
            max_table_count: metrics.table_count,
        }
    }

    /// Folds a later sighting into the record.
    fn sighted(&mut self, entry: &LogEntry, day: NaiveDate) {
        self.hit_count += 1;
        self.first_seen = self.first_seen.min(day);
        self.last_seen = self.last_seen.max(day);
        if let Some(metrics) = entry.deployment_metrics {
            self.max_server_count = self.max_server_count.max(metrics.server_count);
            self.max_table_count = self.max_table_count.max(metrics.table_count);
        }
    }
}

/// Registry of clients keyed by client id, in order of first sighting.
///
/// Created once per run and owned by whoever drives the aggregation. Nothing is ever removed.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Registry {
    /// Client id → record
    clients: IndexMap<String, ClientRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one check-in logged on `day`, creating the client's record if needed.
    pub fn observe(&mut self, entry: &LogEntry, day: NaiveDate) {
        match self.clients.get_mut(&entry.client_id) {
            Some(record) => record.sighted(entry, day),
            None => {
                self.clients.insert(
                    entry.client_id.clone(),
                    ClientRecord::first_sighting(entry, day),
                );
            }
        }
    }

    pub fn is_known(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientRecord> {
        self.clients.get(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Records in order of first sighting.
    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }

    pub fn client_ids(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Total number of check-ins folded into the registry.
    pub fn total_hits(&self) -> u64 {
        self.iter().map(|r| r.hit_count).sum()
    }

    /// Whether any client ever reported a non-zero deployment size.
    pub fn has_deployment_metrics(&self) -> bool {
        self.iter()
            .any(|r| r.max_server_count > 0 || r.max_table_count > 0)
    }

    /// For each `k` in `1..=MAX_REPEAT`, the number of clients seen at least `k` times.
    pub fn repeat_counts(&self) -> Vec<RepeatCount> {
        (1..=MAX_REPEAT)
            .map(|min_hits| RepeatCount {
                min_hits,
                clients: self.iter().filter(|r| r.hit_count >= min_hits).count(),
            })
            .collect()
    }
}

/// Number of clients with at least `min_hits` check-ins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RepeatCount {
    pub min_hits: u64,
    pub clients: usize,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    use super::{ClientRecord, Registry, RepeatCount};
    use crate::record::{DeploymentMetrics, LogEntry};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    fn entry(client_id: &str, metrics: Option<(u64, u64)>) -> LogEntry {
        LogEntry {
            timestamp: NaiveDateTime::default(),
            version: "2.0".to_owned(),
            client_id: client_id.to_owned(),
            deployment_metrics: metrics.map(|(server_count, table_count)| DeploymentMetrics {
                server_count,
                table_count,
            }),
            user_agent: None,
        }
    }

    #[test]
    fn observe_updates_in_place() {
        let mut registry = Registry::new();
        registry.observe(&entry("a", Some((2, 10))), d(5));
        registry.observe(&entry("b", None), d(5));
        registry.observe(&entry("a", Some((1, 30))), d(9));
        // Days may arrive out of order within a caller's own bookkeeping
        registry.observe(&entry("a", Some((4, 0))), d(3));

        assert_eq!(registry.len(), 2);
        assert!(registry.is_known("a"));
        assert!(!registry.is_known("c"));
        assert_eq!(
            registry.get("a"),
            Some(&ClientRecord {
                client_id: "a".to_owned(),
                hit_count: 3,
                first_seen: d(3),
                last_seen: d(9),
                max_server_count: 4,
                max_table_count: 30,
            })
        );
        assert_eq!(registry.total_hits(), 4);
        assert_eq!(registry.client_ids().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn first_seen_never_after_last_seen() {
        let mut registry = Registry::new();
        for (i, day) in [7, 2, 9, 1, 4, 4, 8].into_iter().enumerate() {
            let id = if i % 2 == 0 { "x" } else { "y" };
            registry.observe(&entry(id, None), d(day));
        }
        assert!(registry.iter().all(|r| r.first_seen <= r.last_seen));
    }

    #[test]
    fn metrics_presence() {
        let mut registry = Registry::new();
        registry.observe(&entry("a", None), d(1));
        assert!(!registry.has_deployment_metrics());
        registry.observe(&entry("b", Some((0, 1))), d(1));
        assert!(registry.has_deployment_metrics());
    }

    #[test]
    fn repeat_histogram() {
        let mut registry = Registry::new();
        for (id, hits) in [("a", 1), ("b", 3), ("c", 9)] {
            for _ in 0..hits {
                registry.observe(&entry(id, None), d(1));
            }
        }

        assert_eq!(
            registry
                .repeat_counts()
                .into_iter()
                .map(|RepeatCount { min_hits, clients }| (min_hits, clients))
                .collect::<Vec<_>>(),
            [(1, 3), (2, 2), (3, 2), (4, 1), (5, 1), (6, 1), (7, 1)]
        );
    }
}
