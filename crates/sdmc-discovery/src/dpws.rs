//! DPWS metadata retrieval: WS-Transfer `Get` over HTTP.

use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;
use crate::soap;

/// Fetches device metadata from one `XAddrs` endpoint and returns the
/// NetBIOS name derived from its friendly name.
pub async fn fetch_netbios_name(
    http: &reqwest::Client,
    xaddr: &str,
    timeout: Duration,
) -> Result<String> {
    let message_id = format!("urn:uuid:{}", Uuid::new_v4());
    let body = soap::get_metadata_envelope(&message_id, xaddr);

    let response = http
        .post(xaddr)
        .header("Content-Type", "application/soap+xml; charset=utf-8")
        .timeout(timeout)
        .body(body)
        .send()
        .await?
        .error_for_status()?;
    let envelope = response.text().await?;

    let friendly = soap::parse_friendly_name(&envelope)?;
    let name = soap::netbios_name_from_friendly(&friendly)?;
    log::debug!("Metadata at {xaddr}: friendly name {friendly:?} -> {name}");
    Ok(name)
}
