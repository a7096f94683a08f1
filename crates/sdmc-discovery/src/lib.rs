//! Zero-configuration discovery of the console on the local network.
//!
//! Order of attempts, all under one total budget:
//!
//! 1. a cached `(ip, name)` pair, revalidated with a fast TCP probe;
//! 2. a WS-Discovery `Probe` over UDP multicast, collecting `ProbeMatch`
//!    answers;
//! 3. a DPWS `GetMetadata` fetch against each advertised endpoint to
//!    recover the NetBIOS name.
//!
//! When nothing pans out the caller gets a structured failure; with
//! `allow_interactive` set, that failure is [`DiscoveryError::NeedsUserInput`]
//! carrying whatever partial information (an IP without a name) was found,
//! so a shell can prompt for the rest.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub mod cache;
pub mod dpws;
pub mod error;
mod soap;
pub mod ws_discovery;
mod xml;

pub use cache::CacheRecord;
pub use error::{DiscoveryError, Result};
pub use ws_discovery::ProbeMatch;

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Path of the single-line cache file; `None` disables the cache.
    pub cache_path: Option<PathBuf>,
    /// Overall deadline across cache probe, multicast wait, and metadata
    /// fetches.
    pub total_budget: Duration,
    /// How long to collect multicast answers.
    pub multicast_wait: Duration,
    /// Per-endpoint metadata HTTP timeout.
    pub metadata_timeout: Duration,
    /// TCP probe timeout when revalidating a cache entry.
    pub cache_probe_timeout: Duration,
    /// Surface failures as [`DiscoveryError::NeedsUserInput`] so a caller
    /// can fall back to prompting.
    pub allow_interactive: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            cache_path: None,
            total_budget: Duration::from_millis(1500),
            multicast_wait: Duration::from_millis(700),
            metadata_timeout: Duration::from_millis(500),
            cache_probe_timeout: Duration::from_millis(200),
            allow_interactive: true,
        }
    }
}

/// Where the answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Cache,
    Probe,
}

/// Timing breakdown of a discovery run, for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryTimings {
    pub cache_probe: Option<Duration>,
    pub multicast: Option<Duration>,
    pub metadata: Option<Duration>,
    pub total: Duration,
}

#[derive(Debug, Clone)]
pub struct Discovered {
    pub ip: Ipv4Addr,
    pub name: String,
    pub source: DiscoverySource,
    pub timings: DiscoveryTimings,
}

/// Locates the console. See the module docs for the attempt order.
pub async fn discover(options: &DiscoverOptions) -> Result<Discovered> {
    let started = Instant::now();
    let mut timings = DiscoveryTimings::default();

    // 1. Cache, revalidated with a TCP probe and never trusted blindly.
    if let Some(path) = &options.cache_path {
        if let Some(record) = cache::load(path).await {
            let probe_started = Instant::now();
            let alive = cache::validate(record.ip, options.cache_probe_timeout).await;
            timings.cache_probe = Some(probe_started.elapsed());
            if alive {
                timings.total = started.elapsed();
                log::info!("Using cached console {} at {}", record.name, record.ip);
                return Ok(Discovered {
                    ip: record.ip,
                    name: record.name,
                    source: DiscoverySource::Cache,
                    timings,
                });
            }
            log::debug!("Cache entry {} is stale, probing the network", record.ip);
            cache::invalidate(path).await;
        }
    }

    // 2. Multicast probe, clamped to whatever budget remains.
    let remaining = options.total_budget.saturating_sub(started.elapsed());
    let wait = options.multicast_wait.min(remaining);
    let multicast_started = Instant::now();
    let matches = ws_discovery::probe(wait).await?;
    timings.multicast = Some(multicast_started.elapsed());

    if matches.is_empty() {
        timings.total = started.elapsed();
        return Err(fail(options, DiscoveryError::NoResponders, None));
    }

    // 3. Metadata fetches, sequential; the response set is small.
    let http = reqwest::Client::new();
    let metadata_started = Instant::now();
    let mut partial_ip = None;
    let mut any_reachable = false;
    for candidate in &matches {
        partial_ip.get_or_insert(candidate.source);
        for xaddr in &candidate.xaddrs {
            let remaining = options.total_budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            let timeout = options.metadata_timeout.min(remaining);
            match dpws::fetch_netbios_name(&http, xaddr, timeout).await {
                Ok(name) => {
                    timings.metadata = Some(metadata_started.elapsed());
                    timings.total = started.elapsed();
                    if let Some(path) = &options.cache_path {
                        cache::store(path, &CacheRecord::new(candidate.source, &name)).await;
                    }
                    log::info!(
                        "Discovered console {name} at {} in {:?}",
                        candidate.source,
                        timings.total
                    );
                    return Ok(Discovered {
                        ip: candidate.source,
                        name,
                        source: DiscoverySource::Probe,
                        timings,
                    });
                }
                Err(DiscoveryError::Http(e)) => {
                    log::debug!("Metadata endpoint {xaddr} unreachable: {e}");
                }
                Err(e) => {
                    any_reachable = true;
                    log::debug!("Metadata endpoint {xaddr} unusable: {e}");
                }
            }
        }
    }
    timings.metadata = Some(metadata_started.elapsed());
    timings.total = started.elapsed();

    let cause = if any_reachable {
        DiscoveryError::NameUnresolvable
    } else {
        DiscoveryError::MetadataUnreachable
    };
    Err(fail(options, cause, partial_ip))
}

fn fail(
    options: &DiscoverOptions,
    cause: DiscoveryError,
    partial_ip: Option<Ipv4Addr>,
) -> DiscoveryError {
    log::debug!("Discovery failed: {cause}");
    if options.allow_interactive {
        DiscoveryError::NeedsUserInput { ip: partial_ip }
    } else {
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_failures_carry_partial_info() {
        let options = DiscoverOptions::default();
        let ip = Ipv4Addr::new(192, 168, 1, 7);
        match fail(&options, DiscoveryError::NameUnresolvable, Some(ip)) {
            DiscoveryError::NeedsUserInput { ip: Some(found) } => assert_eq!(found, ip),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_interactive_failures_keep_their_cause() {
        let options = DiscoverOptions {
            allow_interactive: false,
            ..DiscoverOptions::default()
        };
        assert!(matches!(
            fail(&options, DiscoveryError::NoResponders, None),
            DiscoveryError::NoResponders
        ));
    }

    #[tokio::test]
    async fn cache_roundtrip_through_discover_options() {
        let dir = std::env::temp_dir().join(format!("sdmc-cache-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("console.cache");

        let record = CacheRecord::new(Ipv4Addr::new(127, 0, 0, 1), "3DS-TEST");
        cache::store(&path, &record).await;
        let loaded = cache::load(&path).await.unwrap();
        assert_eq!(loaded.name, "3DS-TEST");

        cache::invalidate(&path).await;
        assert!(cache::load(&path).await.is_none());
        let _ = tokio::fs::remove_dir(&dir).await;
    }
}
