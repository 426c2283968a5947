/*
Copyright (C) 2025 The usage-stats authors

This file is part of usage-stats.

usage-stats is free software: you can redistribute it and/or modify it under
the terms of the GNU Affero General Public License as published by the Free
Software Foundation, either version 3 of the License, or (at your option) any
later version.

usage-stats is distributed in the hope that it will be useful, but WITHOUT ANY
WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.

You should have received a copy of the GNU Affero General Public License along
with usage-stats. If not, see <https://www.gnu.org/licenses/>.
*/

//! Driving a whole run: day groups in, report out

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    activity::MIN_ACTIVE,
    bucket::{BucketSummary, partition},
    calendar::Unit,
    error::Error,
    ranker::{DEFAULT_TOP_DEPLOYMENTS, Metric, top_n},
    record::DayGroup,
    registry::{ClientRecord, Registry, RepeatCount},
};

/// Knobs for one aggregation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Settings {
    /// Width of each bucket
    pub unit: Unit,
    /// Whether hit totals are included in exported rows
    pub include_hit_counts: bool,
    /// Check-ins a client must exceed within a bucket to count as active
    pub activity_threshold: u64,
    /// Length of each largest-deployment ranking
    pub top_deployments: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            unit: Unit::Week,
            include_hit_counts: true,
            activity_threshold: MIN_ACTIVE,
            top_deployments: DEFAULT_TOP_DEPLOYMENTS,
        }
    }
}

/// Figures for the whole run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// First through last day with a log
    pub range: String,
    pub unique_count: usize,
    /// Left out when the run excludes hit counts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
}

/// Everything a run produces.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub settings: Settings,
    pub summaries: Vec<BucketSummary>,
    pub totals: Totals,
    pub repeat_counts: Vec<RepeatCount>,
    /// Largest deployments by server count; empty when no client reported metrics
    pub most_servers: Vec<ClientRecord>,
    /// Largest deployments by table count; empty when no client reported metrics
    pub most_tables: Vec<ClientRecord>,
    /// Every client seen during the run
    pub registry: Registry,
}

/// A bucket summary in the shape handed to exporters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub range: String,
    pub uniques: usize,
    pub existing: usize,
    pub new: usize,
    /// Clients above the activity threshold
    pub actives: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<usize>,
}

impl Report {
    /// One row per bucket, with hit counts only when the run was configured to include them.
    pub fn rows(&self) -> Vec<ReportRow> {
        self.summaries
            .iter()
            .map(|s| ReportRow {
                range: s.label.clone(),
                uniques: s.unique_count,
                existing: s.existing_count,
                new: s.new_count,
                actives: s.active_count,
                hits: self.settings.include_hit_counts.then_some(s.hit_count),
            })
            .collect()
    }
}

/// Aggregates a run's day groups.
///
/// The day groups are put in date order first. Buckets are then summarized one after the other
/// against a registry created for this run, which ends up in the returned report.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] when `days` is empty.
#[instrument(name = "engine.run", skip_all, fields(unit = %settings.unit))]
pub fn run(mut days: Vec<DayGroup>, settings: &Settings) -> Result<Report, Error> {
    days.sort_by_key(|day| day.date);
    let range = match (days.first(), days.last()) {
        (Some(first), Some(last)) => format!("{} - {}", first.date, last.date),
        _ => return Err(Error::EmptyInput),
    };

    let buckets = partition(days, settings.unit)?;

    let mut registry = Registry::new();
    let summaries = buckets
        .iter()
        .map(|bucket| bucket.summarize(&mut registry, settings.activity_threshold))
        .collect::<Vec<_>>();

    let (most_servers, most_tables) = if registry.has_deployment_metrics() {
        let rank = |metric| {
            top_n(&registry, metric, settings.top_deployments)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        (rank(Metric::MaxServerCount), rank(Metric::MaxTableCount))
    } else {
        (Vec::new(), Vec::new())
    };

    let totals = Totals {
        range,
        unique_count: registry.len(),
        hit_count: settings
            .include_hit_counts
            .then(|| registry.total_hits()),
    };
    info!(
        buckets = summaries.len(),
        uniques = totals.unique_count,
        hits = registry.total_hits(),
        "Aggregated usage statistics"
    );

    Ok(Report {
        settings: settings.clone(),
        summaries,
        totals,
        repeat_counts: registry.repeat_counts(),
        most_servers,
        most_tables,
        registry,
    })
}
