//! WS-Discovery multicast probing.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::error::Result;
use crate::soap;

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const WSD_PORT: u16 = 3702;

/// One deduplicated responder.
#[derive(Debug, Clone)]
pub struct ProbeMatch {
    pub source: Ipv4Addr,
    pub xaddrs: Vec<String>,
}

/// Sends one `Probe` to the WS-Discovery group and collects every valid
/// `ProbeMatch` until `wait` elapses. Responders are deduplicated by
/// source address; envelopes whose `RelatesTo` does not match our
/// `MessageID` are dropped as cross-talk.
pub async fn probe(wait: Duration) -> Result<Vec<ProbeMatch>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(1)?;

    let message_id = format!("urn:uuid:{}", Uuid::new_v4());
    let envelope = soap::probe_envelope(&message_id);
    socket
        .send_to(
            envelope.as_bytes(),
            SocketAddr::new(IpAddr::V4(MULTICAST_GROUP), WSD_PORT),
        )
        .await?;
    log::debug!("Sent WS-Discovery probe {message_id}");

    let mut matches = Vec::new();
    let mut seen = HashSet::new();
    let deadline = Instant::now() + wait;
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let (len, peer) = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => break,
        };
        let IpAddr::V4(source) = peer.ip() else {
            continue;
        };
        if !seen.insert(source) {
            continue;
        }

        let envelope = String::from_utf8_lossy(&buf[..len]);
        match soap::parse_probe_match(&envelope, &message_id) {
            Ok(xaddrs) => {
                log::debug!("ProbeMatch from {source}: {xaddrs:?}");
                matches.push(ProbeMatch { source, xaddrs });
            }
            Err(e) => {
                log::debug!("Ignoring datagram from {source}: {e}");
                // A later valid answer from the same host would be rare;
                // forget the address so it gets another chance.
                seen.remove(&source);
            }
        }
    }
    Ok(matches)
}
