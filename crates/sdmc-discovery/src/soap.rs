//! SOAP envelope construction and decoding for WS-Discovery and
//! WS-Transfer/DPWS.

use crate::error::{DiscoveryError, Result};
use crate::xml;

pub(crate) const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub(crate) const WSA_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
pub(crate) const WSD_NS: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";
pub(crate) const DPWS_NS: &str = "http://schemas.xmlsoap.org/ws/2006/02/devprof";

const PROBE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
const TRANSFER_GET_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";
const DISCOVERY_TO: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";
const ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

/// The multicast `Probe` envelope. An unconstrained probe (no Types, no
/// Scopes) keeps the console's minimal DPWS stack happy.
pub(crate) fn probe_envelope(message_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}" xmlns:wsa="{WSA_NS}" xmlns:wsd="{WSD_NS}">
<soap:Header>
<wsa:To>{DISCOVERY_TO}</wsa:To>
<wsa:Action>{PROBE_ACTION}</wsa:Action>
<wsa:MessageID>{message_id}</wsa:MessageID>
</soap:Header>
<soap:Body><wsd:Probe/></soap:Body>
</soap:Envelope>"#
    )
}

/// The WS-Transfer `Get` envelope posted to an `XAddrs` endpoint.
pub(crate) fn get_metadata_envelope(message_id: &str, to: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}" xmlns:wsa="{WSA_NS}">
<soap:Header>
<wsa:To>{to}</wsa:To>
<wsa:Action>{TRANSFER_GET_ACTION}</wsa:Action>
<wsa:MessageID>{message_id}</wsa:MessageID>
<wsa:ReplyTo><wsa:Address>{ANONYMOUS}</wsa:Address></wsa:ReplyTo>
</soap:Header>
<soap:Body/>
</soap:Envelope>"#
    )
}

/// Decodes a `ProbeMatch` envelope into its `XAddrs` URLs, verifying that
/// `RelatesTo` matches the probe we actually sent (stray multicast answers
/// for someone else's probe are dropped).
pub(crate) fn parse_probe_match(envelope: &str, sent_message_id: &str) -> Result<Vec<String>> {
    let relates_to = xml::extract_text(envelope, &[WSA_NS], "RelatesTo")
        .ok_or_else(|| DiscoveryError::BadEnvelope("missing RelatesTo".into()))?;
    if relates_to != sent_message_id {
        return Err(DiscoveryError::BadEnvelope(format!(
            "RelatesTo {relates_to} does not match our probe"
        )));
    }

    let xaddrs: Vec<String> = xml::extract_all_text(envelope, &[WSD_NS], "XAddrs")
        .iter()
        .flat_map(|list| list.split_whitespace())
        .filter(|url| url.starts_with("http://"))
        .map(str::to_string)
        .collect();
    if xaddrs.is_empty() {
        return Err(DiscoveryError::BadEnvelope("no usable XAddrs".into()));
    }
    Ok(xaddrs)
}

/// Pulls `ThisDevice/FriendlyName` out of a `GetMetadata` response.
pub(crate) fn parse_friendly_name(envelope: &str) -> Result<String> {
    // Some stacks put FriendlyName in the DPWS namespace, others leave it
    // under a vendor default; fall back to an unconstrained match.
    let name = xml::extract_text(envelope, &[DPWS_NS], "FriendlyName")
        .or_else(|| xml::extract_text(envelope, &[], "FriendlyName"))
        .ok_or(DiscoveryError::NameUnresolvable)?;
    if name.is_empty() {
        return Err(DiscoveryError::NameUnresolvable);
    }
    Ok(name)
}

/// Derives the NetBIOS name from a DPWS friendly name: drop any vendor
/// prefix words, keep NetBIOS-safe characters, upper-case, clamp to 15.
pub(crate) fn netbios_name_from_friendly(friendly: &str) -> Result<String> {
    let candidate = friendly
        .split_whitespace()
        .next_back()
        .unwrap_or(friendly);
    let mut name: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    name.truncate(15);
    if name.is_empty() {
        return Err(DiscoveryError::NameUnresolvable);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE_ID: &str = "urn:uuid:11111111-2222-3333-4444-555555555555";

    fn probe_match(relates_to: &str, xaddrs: &str) -> String {
        format!(
            r#"<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}" xmlns:wsa="{WSA_NS}" xmlns:wsd="{WSD_NS}">
<soap:Header><wsa:RelatesTo>{relates_to}</wsa:RelatesTo></soap:Header>
<soap:Body><wsd:ProbeMatches><wsd:ProbeMatch>
<wsd:XAddrs>{xaddrs}</wsd:XAddrs>
</wsd:ProbeMatch></wsd:ProbeMatches></soap:Body>
</soap:Envelope>"#
        )
    }

    #[test]
    fn probe_envelope_carries_action_and_id() {
        let envelope = probe_envelope(MESSAGE_ID);
        assert!(envelope.contains(PROBE_ACTION));
        assert!(envelope.contains(MESSAGE_ID));
        assert!(envelope.contains("<wsd:Probe/>"));
    }

    #[test]
    fn probe_match_roundtrip() {
        let envelope = probe_match(MESSAGE_ID, "http://192.168.1.7:5357/a http://10.0.0.2:5357/b");
        let xaddrs = parse_probe_match(&envelope, MESSAGE_ID).unwrap();
        assert_eq!(
            xaddrs,
            ["http://192.168.1.7:5357/a", "http://10.0.0.2:5357/b"]
        );
    }

    #[test]
    fn probe_match_rejects_foreign_relates_to() {
        let envelope = probe_match("urn:uuid:someone-else", "http://192.168.1.7:5357/a");
        assert!(matches!(
            parse_probe_match(&envelope, MESSAGE_ID),
            Err(DiscoveryError::BadEnvelope(_))
        ));
    }

    #[test]
    fn probe_match_ignores_non_http_xaddrs() {
        let envelope = probe_match(MESSAGE_ID, "https://x/ hxxp://y/");
        assert!(parse_probe_match(&envelope, MESSAGE_ID).is_err());
    }

    #[test]
    fn friendly_name_extraction() {
        let envelope = format!(
            r#"<e xmlns:dpws="{DPWS_NS}"><dpws:ThisDevice>
<dpws:FriendlyName>Nintendo 3DS-A1B2</dpws:FriendlyName>
</dpws:ThisDevice></e>"#
        );
        assert_eq!(parse_friendly_name(&envelope).unwrap(), "Nintendo 3DS-A1B2");
    }

    #[test]
    fn netbios_name_strips_vendor_prefix() {
        assert_eq!(
            netbios_name_from_friendly("Nintendo 3DS-A1B2").unwrap(),
            "3DS-A1B2"
        );
        assert_eq!(netbios_name_from_friendly("solo").unwrap(), "SOLO");
        assert_eq!(
            netbios_name_from_friendly("x 0123456789abcdefgh").unwrap(),
            "0123456789ABCDE"
        );
        assert!(netbios_name_from_friendly("  ").is_err());
    }
}
