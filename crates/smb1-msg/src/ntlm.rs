//! The session-setup security blob: a SPNEGO `NegTokenInit` carrying an
//! NTLMSSP `NEGOTIATE_MESSAGE`.
//!
//! The microSD Management server grants a session without inspecting the
//! blob, but the token is kept syntactically valid so a conformant server
//! would still accept it as the opening leg of an NTLM exchange.

/// OID 1.3.6.1.5.5.2 (SPNEGO), DER-encoded.
const OID_SPNEGO: &[u8] = &[0x06, 0x06, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x02];

/// OID 1.3.6.1.4.1.311.2.2.10 (NTLMSSP), DER-encoded.
const OID_NTLMSSP: &[u8] = &[
    0x06, 0x0A, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0A,
];

const NTLMSSP_SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
const NTLM_NEGOTIATE: u32 = 1;

/// NEGOTIATE_UNICODE | NEGOTIATE_OEM | REQUEST_TARGET | NEGOTIATE_NTLM
/// | NEGOTIATE_ALWAYS_SIGN | NEGOTIATE_EXTENDED_SESSIONSECURITY.
const NEGOTIATE_FLAGS: u32 = 0x0008_8207;

/// DER TLV with definite length encoding.
fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let significant: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
    out.extend_from_slice(content);
    out
}

/// An NTLMSSP NEGOTIATE_MESSAGE with empty domain and workstation fields.
fn ntlm_negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(NTLMSSP_SIGNATURE);
    msg.extend_from_slice(&NTLM_NEGOTIATE.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Domain and workstation: length 0, max length 0, offset at end of the
    // fixed structure.
    for _ in 0..2 {
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&32u32.to_le_bytes());
    }
    msg
}

/// Builds the complete `NegTokenInit` security blob for SESSION_SETUP_ANDX.
pub fn negotiate_blob() -> Vec<u8> {
    let mech_types = der(0xA0, &der(0x30, OID_NTLMSSP));
    let mech_token = der(0xA2, &der(0x04, &ntlm_negotiate_message()));

    let mut neg_token_init = mech_types;
    neg_token_init.extend_from_slice(&mech_token);
    let inner = der(0xA0, &der(0x30, &neg_token_init));

    let mut gss = OID_SPNEGO.to_vec();
    gss.extend_from_slice(&inner);
    der(0x60, &gss)
}
