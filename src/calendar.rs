//! Calendar arithmetic for week and month buckets

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The width of a reporting bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Unit {
    #[default]
    Week,
    Month,
}

impl Unit {
    /// Rolls `date` back to the start of the bucket containing it.
    pub fn roll_back(self, date: NaiveDate) -> NaiveDate {
        match self {
            Unit::Week => roll_back_to_week_start(date),
            Unit::Month => roll_back_to_month_start(date),
        }
    }

    /// Advances `date` by one unit.
    pub fn roll_forward(self, date: NaiveDate) -> NaiveDate {
        match self {
            Unit::Week => roll_forward_one_week(date),
            Unit::Month => roll_forward_one_month(date),
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Unit::Week),
            "month" => Ok(Unit::Month),
            other => Err(Error::UnrecognizedUnit(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unit::Week => "week",
            Unit::Month => "month",
        })
    }
}

/// The Monday on or before `date`.
pub fn roll_back_to_week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday();
    date.checked_sub_days(Days::new(offset.into()))
        .unwrap_or(NaiveDate::MIN)
}

pub fn roll_forward_one_week(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX)
}

pub fn roll_back_to_month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The same day of the month one calendar month later.
///
/// Days past the end of the next month are clamped, so January 31st becomes the last day of
/// February.
pub fn roll_forward_one_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// The bucket boundaries needed to cover every date from `first` to `last`.
///
/// The list starts at the rolled-back start of `first` and ends with the first boundary strictly
/// after `last` (or `NaiveDate::MAX`), so consecutive pairs are the `[from, to)` windows of the
/// buckets. There are always at least two boundaries.
pub fn boundaries(first: NaiveDate, last: NaiveDate, unit: Unit) -> Vec<NaiveDate> {
    let mut current = unit.roll_back(first);
    let mut out = vec![current];
    loop {
        current = unit.roll_forward(current);
        out.push(current);
        if current > last || current == NaiveDate::MAX {
            return out;
        }
    }
}

/// Counts timestamps per calendar month, keyed by `(year, month)`.
pub fn monthly_counts(
    timestamps: impl IntoIterator<Item = NaiveDateTime>,
) -> BTreeMap<(i32, u32), usize> {
    let mut counts = BTreeMap::new();
    for ts in timestamps {
        *counts.entry((ts.year(), ts.month())).or_insert(0) += 1;
    }
    counts
}

/// Formats a `(year, month)` key the way period labels are written, e.g. `2012-10`.
pub fn period_label((year, month): (i32, u32)) -> String {
    format!("{year:04}-{month:02}")
}
