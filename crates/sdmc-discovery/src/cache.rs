//! The advisory discovery cache: one line, `ip\tname\ttimestamp`.
//!
//! The cache only short-circuits the probe path; a cached address is always
//! revalidated with a TCP connect before being trusted. Absent or corrupt
//! files read as "no cache", and write races between processes are fine
//! (last writer wins).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::TcpStream;

const SMB_PORT: u16 = 139;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub ip: Ipv4Addr,
    pub name: String,
    pub timestamp: u64,
}

impl CacheRecord {
    pub fn new(ip: Ipv4Addr, name: &str) -> Self {
        Self {
            ip,
            name: name.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split('\t');
        let ip = fields.next()?.parse().ok()?;
        let name = fields.next()?.to_string();
        let timestamp = fields.next()?.parse().ok()?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            ip,
            name,
            timestamp,
        })
    }

    fn format(&self) -> String {
        format!("{}\t{}\t{}\n", self.ip, self.name, self.timestamp)
    }
}

pub async fn load(path: &Path) -> Option<CacheRecord> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let record = CacheRecord::parse(&contents);
    if record.is_none() {
        log::debug!("Ignoring corrupt discovery cache at {}", path.display());
    }
    record
}

/// Best-effort write; failures are logged and swallowed (the cache is
/// advisory).
pub async fn store(path: &Path, record: &CacheRecord) {
    if let Err(e) = tokio::fs::write(path, record.format()).await {
        log::debug!("Failed to write discovery cache {}: {e}", path.display());
    }
}

pub async fn invalidate(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::debug!("Failed to drop discovery cache {}: {e}", path.display());
        }
    }
}

/// A fast TCP probe of the SMB port; the only trust check a cache entry
/// gets before we hand it out.
pub async fn validate(ip: Ipv4Addr, timeout: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), SMB_PORT);
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let record = CacheRecord {
            ip: Ipv4Addr::new(192, 168, 1, 7),
            name: "3DS-A1B2".to_string(),
            timestamp: 1_700_000_000,
        };
        let line = record.format();
        assert_eq!(line, "192.168.1.7\t3DS-A1B2\t1700000000\n");
        assert_eq!(CacheRecord::parse(&line).unwrap(), record);
    }

    #[test]
    fn corrupt_lines_read_as_no_cache() {
        for line in [
            "",
            "no-tabs-here",
            "300.1.2.3\tname\t5",
            "192.168.1.7\t\t5",
            "192.168.1.7\tname\tnot-a-number",
        ] {
            assert_eq!(CacheRecord::parse(line), None, "line {line:?}");
        }
    }

    #[tokio::test]
    async fn validate_fails_fast_on_dead_address() {
        // TEST-NET-1 is unrouteable; the probe must come back within the
        // timeout rather than hanging.
        let start = std::time::Instant::now();
        let alive = validate(Ipv4Addr::new(192, 0, 2, 1), Duration::from_millis(100)).await;
        assert!(!alive);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
