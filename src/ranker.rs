//! Largest deployments by reported size

use serde::{Deserialize, Serialize};

use crate::registry::{ClientRecord, Registry};

/// How many deployments each ranking lists by default.
pub const DEFAULT_TOP_DEPLOYMENTS: usize = 25;

/// Deployment size used to rank clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    MaxServerCount,
    MaxTableCount,
}

impl Metric {
    fn of(self, record: &ClientRecord) -> u64 {
        match self {
            Metric::MaxServerCount => record.max_server_count,
            Metric::MaxTableCount => record.max_table_count,
        }
    }
}

/// The `n` clients with the largest `metric`, largest first.
///
/// Ties are broken by client id so the ranking is stable between runs.
pub fn top_n(registry: &Registry, metric: Metric, n: usize) -> Vec<&ClientRecord> {
    let mut records = registry.iter().collect::<Vec<_>>();
    records.sort_by(|a, b| {
        metric
            .of(b)
            .cmp(&metric.of(a))
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    records.truncate(n);
    records
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::{Metric, top_n};
    use crate::{
        record::{DeploymentMetrics, LogEntry},
        registry::Registry,
    };

    fn registry(clients: &[(&str, u64, u64)]) -> Registry {
        let day = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let mut registry = Registry::new();
        for &(id, server_count, table_count) in clients {
            registry.observe(
                &LogEntry {
                    timestamp: day.and_hms_opt(0, 0, 0).unwrap(),
                    version: "2.0".to_owned(),
                    client_id: id.to_owned(),
                    deployment_metrics: Some(DeploymentMetrics {
                        server_count,
                        table_count,
                    }),
                    user_agent: None,
                },
                day,
            );
        }
        registry
    }

    fn ids(records: &[&crate::registry::ClientRecord]) -> Vec<String> {
        records.iter().map(|r| r.client_id.clone()).collect()
    }

    #[test]
    fn ranks_by_metric_with_id_tiebreak() {
        let registry = registry(&[
            ("d", 2, 100),
            ("b", 5, 1),
            ("a", 5, 7),
            ("c", 1, 100),
        ]);

        assert_eq!(
            ids(&top_n(&registry, Metric::MaxServerCount, 3)),
            ["a", "b", "d"]
        );
        assert_eq!(
            ids(&top_n(&registry, Metric::MaxTableCount, 4)),
            ["c", "d", "a", "b"]
        );
    }

    #[test]
    fn length_is_min_of_n_and_registry_size() {
        let registry = registry(&[("a", 1, 1), ("b", 2, 2)]);
        assert_eq!(top_n(&registry, Metric::MaxTableCount, 25).len(), 2);
        assert_eq!(top_n(&registry, Metric::MaxTableCount, 1).len(), 1);
        assert!(top_n(&Registry::new(), Metric::MaxServerCount, 5).is_empty());
    }

    #[test]
    fn output_is_sorted_descending() {
        let registry = registry(&[("a", 3, 9), ("b", 8, 2), ("c", 5, 5), ("e", 0, 0)]);
        for metric in [Metric::MaxServerCount, Metric::MaxTableCount] {
            let ranked = top_n(&registry, metric, 10);
            assert!(ranked.windows(2).all(|w| metric.of(w[0]) >= metric.of(w[1])));
        }
        assert_eq!(registry.len(), 4);
    }
}
