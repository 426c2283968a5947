//! Bulk reverse DNS resolution of client addresses

use std::{
    collections::{HashMap, HashSet},
    io,
    net::IpAddr,
    num::NonZeroUsize,
    sync::Arc,
    time::Duration,
};

use chrono::NaiveDate;
use futures::{StreamExt, stream};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::registry::Registry;

/// Default number of lookups in flight at once.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(64).unwrap();
/// Default time a single lookup may take before it is abandoned.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single reverse lookup produced no host name.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("not an IP address")]
    InvalidAddress,
    #[error("lookup failed: {0}")]
    Lookup(#[from] io::Error),
    #[error("lookup timed out after {0:?}")]
    TimedOut(Duration),
    #[error("lookup worker died: {0}")]
    Worker(String),
}

/// A blocking reverse lookup of one address.
pub trait ReverseLookup: Send + Sync + 'static {
    /// Returns the host name registered for `addr`.
    fn lookup(&self, addr: IpAddr) -> Result<String, LookupError>;
}

/// Reverse lookups through the operating system's resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl ReverseLookup for SystemResolver {
    fn lookup(&self, addr: IpAddr) -> Result<String, LookupError> {
        Ok(dns_lookup::lookup_addr(&addr)?)
    }
}

/// Resolves every client id to a host name.
///
/// At most `concurrency_limit` lookups run at once, each on the blocking thread pool and each
/// bounded by `timeout`. A lookup that times out keeps its slot until the blocking call actually
/// returns. A lookup that fails for any reason maps its id to an empty string; the returned map
/// always has one key per distinct id.
#[instrument(name = "geo.resolve_all", skip_all, fields(concurrency = concurrency_limit.get()))]
pub async fn resolve_all<R, I>(
    resolver: Arc<R>,
    client_ids: I,
    concurrency_limit: NonZeroUsize,
    timeout: Duration,
) -> HashMap<String, String>
where
    R: ReverseLookup,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = HashSet::new();
    let ids = client_ids
        .into_iter()
        .map(Into::into)
        .filter(|id: &String| seen.insert(id.clone()))
        .collect::<Vec<_>>();
    info!(count = ids.len(), "Starting reverse lookups");

    let slots = Arc::new(Semaphore::new(concurrency_limit.get()));
    let hosts = stream::iter(ids)
        .map(|client_id| {
            let resolver = Arc::clone(&resolver);
            let slots = Arc::clone(&slots);
            async move {
                let host = match resolve_one(resolver, slots, &client_id, timeout).await {
                    Ok(host) => host,
                    Err(err) => {
                        debug!(%client_id, "No host name: {err}");
                        String::new()
                    }
                };
                (client_id, host)
            }
        })
        .buffer_unordered(concurrency_limit.get())
        .collect::<HashMap<_, _>>()
        .await;

    info!(
        resolved = hosts.values().filter(|h| !h.is_empty()).count(),
        total = hosts.len(),
        "Finished reverse lookups"
    );

    hosts
}

/// Resolves one client id on the blocking pool once a slot is free.
async fn resolve_one<R: ReverseLookup>(
    resolver: Arc<R>,
    slots: Arc<Semaphore>,
    client_id: &str,
    timeout: Duration,
) -> Result<String, LookupError> {
    let addr = client_id
        .parse::<IpAddr>()
        .map_err(|_| LookupError::InvalidAddress)?;
    let permit = slots
        .acquire_owned()
        .await
        .map_err(|err| LookupError::Worker(err.to_string()))?;
    let task = tokio::task::spawn_blocking(move || {
        // Released when the resolver returns, not when the caller stops waiting
        let _permit = permit;
        resolver.lookup(addr)
    });

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(LookupError::TimedOut(timeout)),
        Ok(Err(join_err)) => Err(LookupError::Worker(join_err.to_string())),
        Ok(Ok(result)) => result,
    }
}

/// One line of the host table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostRow {
    pub hits: u64,
    /// Resolved host name, or the client id itself when it didn't resolve
    pub host: String,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
}

/// Joins resolved host names with the registry, ordered by hits and then host.
///
/// Different addresses may resolve to the same host, in which case the host appears once per
/// address.
pub fn host_rows(registry: &Registry, hosts: &HashMap<String, String>) -> Vec<HostRow> {
    let mut rows = registry
        .iter()
        .map(|record| {
            let host = hosts
                .get(&record.client_id)
                .filter(|host| !host.is_empty())
                .unwrap_or(&record.client_id);
            HostRow {
                hits: record.hit_count,
                host: host.clone(),
                first_seen: record.first_seen,
                last_seen: record.last_seen,
            }
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| a.hits.cmp(&b.hits).then_with(|| a.host.cmp(&b.host)));
    rows
}
