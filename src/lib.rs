//! Usage statistics from daily client check-in logs
//!
//! Day groups of parsed check-ins go in; per-bucket summaries, the registry of every client seen
//! and the largest deployments come out. See [`engine::run`] for the whole pipeline and
//! [`geo::resolve_all`] for reverse lookups over the final registry.

pub mod activity;
pub mod bucket;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod geo;
pub mod ranker;
pub mod record;
pub mod registry;

pub use bucket::{Bucket, BucketSummary, partition};
pub use calendar::Unit;
pub use engine::{Report, Settings, run};
pub use error::{Error, ParseError};
pub use record::{DayGroup, DeploymentMetrics, LogEntry, LogKind};
pub use registry::{ClientRecord, Registry};
