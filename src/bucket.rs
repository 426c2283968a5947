//! Partitioning of day groups into calendar buckets and their reduction to summaries

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::{
    activity::count_active,
    calendar::{Unit, boundaries},
    error::Error,
    record::DayGroup,
    registry::Registry,
};

/// Date format used in bucket labels.
const LABEL_DATE_FMT: &str = "%Y-%m-%d";

/// A calendar-aligned `[from, to)` window and the day groups that fall inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Day groups in date order; empty for a window with no log files
    pub days: Vec<DayGroup>,
}

impl Bucket {
    /// An empty bucket for the given window.
    fn open(from: NaiveDate, to: NaiveDate) -> Self {
        Bucket {
            from,
            to,
            days: Vec::new(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        // A window that ran into the end of the calendar keeps everything that's left
        self.from <= date && (date < self.to || self.to == NaiveDate::MAX)
    }

    /// Human readable date range.
    ///
    /// Covers the first through last day that actually had a log, or the whole window when the
    /// bucket is empty.
    pub fn label(&self) -> String {
        let (first, last) = match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => (first.date, last.date),
            _ => (
                self.from,
                self.to.checked_sub_days(Days::new(1)).unwrap_or(self.from),
            ),
        };
        format!(
            "{} - {}",
            first.format(LABEL_DATE_FMT),
            last.format(LABEL_DATE_FMT)
        )
    }

    pub fn hit_count(&self) -> usize {
        self.days.iter().map(DayGroup::hit_count).sum()
    }

    /// Check-ins per client within this bucket.
    fn hits_per_client(&self) -> HashMap<&str, u64> {
        let mut hits = HashMap::new();
        for entry in self.days.iter().flat_map(|day| &day.entries) {
            *hits.entry(entry.client_id.as_str()).or_insert(0) += 1;
        }
        hits
    }

    /// Reduces the bucket to its statistics and folds its check-ins into `registry`.
    ///
    /// Clients are classified as new or existing against the registry as it stood before this
    /// bucket, so buckets must be summarized in chronological order.
    pub fn summarize(&self, registry: &mut Registry, activity_threshold: u64) -> BucketSummary {
        let hits = self.hits_per_client();
        let new_count = hits.keys().filter(|id| !registry.is_known(id)).count();

        for day in &self.days {
            for entry in &day.entries {
                registry.observe(entry, day.date);
            }
        }

        let unique_count = hits.len();
        BucketSummary {
            label: self.label(),
            from: self.from,
            to: self.to,
            hit_count: self.hit_count(),
            unique_count,
            new_count,
            existing_count: unique_count - new_count,
            active_count: count_active(&hits, activity_threshold),
        }
    }
}

/// Statistics for one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub label: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Check-ins in the bucket
    pub hit_count: usize,
    /// Distinct clients in the bucket
    pub unique_count: usize,
    /// Clients never seen in an earlier bucket
    pub new_count: usize,
    pub existing_count: usize,
    /// Clients whose check-ins in the bucket exceed the activity threshold
    pub active_count: usize,
}

/// Splits date-ordered day groups into consecutive `unit`-wide buckets.
///
/// The first window starts at the rolled-back boundary of the first day. Windows without any day
/// group between two populated ones are kept as empty buckets. The last bucket always holds at
/// least one day group.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] for an empty sequence and [`Error::OutOfOrder`] when a day group
/// is dated before the window being filled.
pub fn partition(
    days: impl IntoIterator<Item = DayGroup>,
    unit: Unit,
) -> Result<Vec<Bucket>, Error> {
    let days = days.into_iter().collect::<Vec<_>>();
    let first = days.first().ok_or(Error::EmptyInput)?.date;
    let last = days.iter().map(|day| day.date).max().unwrap_or(first);

    let mut buckets = boundaries(first, last, unit)
        .windows(2)
        .map(|edges| Bucket::open(edges[0], edges[1]))
        .collect::<Vec<_>>();

    // Every date lies inside the last window, so `current` never runs off the end
    let mut current = 0;
    for day in days {
        if day.date < buckets[current].from {
            return Err(Error::OutOfOrder {
                previous: buckets[current].from,
                next: day.date,
            });
        }
        while !buckets[current].contains(day.date) {
            current += 1;
        }
        buckets[current].days.push(day);
    }

    debug!(count = buckets.len(), %unit, "Partitioned day groups into buckets");

    Ok(buckets)
}
