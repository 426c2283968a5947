//! Parsing of raw check-in log lines

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;

/// Timestamp layouts accepted in the first column, tried in order.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Which variety of log a line comes from.
///
/// Minor logs carry only the version and user agent. Periodic logs additionally report the size
/// of the deployment that checked in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Minor,
    Periodic,
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(LogKind::Minor),
            "periodic" => Ok(LogKind::Periodic),
            other => Err(format!(
                "{other:?} is not a recognized log type, use: minor, periodic"
            )),
        }
    }
}

/// Size of a deployment as reported by a periodic check-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentMetrics {
    pub server_count: u64,
    pub table_count: u64,
}

/// One client check-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub version: String,
    /// De-duplication key, normally the client's IP address
    pub client_id: String,
    pub deployment_metrics: Option<DeploymentMetrics>,
    pub user_agent: Option<String>,
}

impl LogEntry {
    /// Parses one tab-separated log line.
    ///
    /// The timestamp, version and client id columns are required. Deployment metrics are only
    /// read for [`LogKind::Periodic`]; a count that is missing or not a number is taken as zero
    /// rather than rejecting the line.
    pub fn parse(line: &str, kind: LogKind) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split('\t');

        let timestamp = fields
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseError::new(line, "missing timestamp"))?;
        let timestamp =
            parse_timestamp(timestamp).ok_or_else(|| ParseError::new(line, "bad timestamp"))?;

        let version = fields
            .next()
            .ok_or_else(|| ParseError::new(line, "missing version"))?
            .trim();

        let client_id = fields
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseError::new(line, "missing client id"))?;

        let deployment_metrics = match kind {
            LogKind::Minor => None,
            LogKind::Periodic => {
                let server_count = parse_count(fields.next());
                let _system = fields.next();
                let table_count = parse_count(fields.next());
                Some(DeploymentMetrics {
                    server_count,
                    table_count,
                })
            }
        };

        let rest = fields.collect::<Vec<_>>().join("\t");
        let user_agent = Some(rest.trim().to_owned()).filter(|ua| !ua.is_empty());

        Ok(LogEntry {
            timestamp,
            version: version.to_owned(),
            client_id: client_id.to_owned(),
            deployment_metrics,
            user_agent,
        })
    }
}

/// Parses a timestamp column, falling back to a bare date at midnight.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_count(field: Option<&str>) -> u64 {
    field.and_then(|f| f.trim().parse().ok()).unwrap_or(0)
}

/// Every check-in logged on one calendar day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub entries: Vec<LogEntry>,
}

impl DayGroup {
    pub fn new(date: NaiveDate, entries: Vec<LogEntry>) -> Self {
        Self { date, entries }
    }

    /// Builds a day group from the raw lines of one day's log.
    ///
    /// Blank lines are ignored and malformed lines are logged and skipped, so a damaged file
    /// still contributes whatever it can.
    pub fn from_lines<'a>(
        date: NaiveDate,
        lines: impl IntoIterator<Item = &'a str>,
        kind: LogKind,
    ) -> Self {
        let entries = lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match LogEntry::parse(line, kind) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(%date, "Skipping log line: {err}");
                    None
                }
            })
            .collect();

        Self { date, entries }
    }

    pub fn hit_count(&self) -> usize {
        self.entries.len()
    }
}
