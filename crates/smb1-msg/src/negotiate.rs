//! `SMB_COM_NEGOTIATE` (0x72).
//!
//! The client offers exactly one dialect, `NT LM 0.12`; the server must
//! select index 0. The response carries `MaxBufferSize`, which clamps all
//! later read/write chunking.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::binrw_util::FileTime;
use crate::error::SmbMsgError;
use crate::header::Command;
use crate::Request;

pub const NT_LM_0_12: &str = "NT LM 0.12";

/// A single dialect string in the negotiate data block.
#[derive(BinRead, BinWrite, Debug)]
#[brw(magic(b"\x02"))]
pub struct Dialect {
    pub name: binrw::NullString,
}

#[derive(Debug)]
pub struct NegotiateRequest {
    pub dialects: Vec<Dialect>,
}

impl Default for NegotiateRequest {
    fn default() -> Self {
        Self {
            dialects: vec![Dialect {
                name: binrw::NullString::from(NT_LM_0_12),
            }],
        }
    }
}

impl Request for NegotiateRequest {
    const COMMAND: Command = Command::Negotiate;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(Vec::new())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        self.dialects.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct SecurityMode {
    pub user_security: bool,
    pub encrypt_passwords: bool,
    pub signatures_enabled: bool,
    pub signatures_required: bool,
    #[skip]
    __: B4,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct Capabilities {
    pub raw_mode: bool,
    pub mpx_mode: bool,
    pub unicode: bool,
    pub large_files: bool,
    pub nt_smbs: bool,
    pub rpc_remote_apis: bool,
    pub nt_status: bool,
    pub level2_oplocks: bool,
    pub lock_and_read: bool,
    pub nt_find: bool,
    #[skip]
    __: B2,
    pub dfs: bool,
    pub infolevel_passthru: bool,
    pub large_readx: bool,
    pub large_writex: bool,
    #[skip]
    __: B7,
    pub unix: bool,
    #[skip]
    __: B5,
    pub dynamic_reauth: bool,
    #[skip]
    __: B1,
    pub extended_security: bool,
}

/// Parameter words of the `NT LM 0.12` negotiate response (WordCount 17).
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct NegotiateResponseWords {
    pub dialect_index: u16,
    pub security_mode: SecurityMode,
    pub max_mpx_count: u16,
    pub max_number_vcs: u16,
    pub max_buffer_size: u32,
    pub max_raw_size: u32,
    pub session_key: u32,
    pub capabilities: Capabilities,
    pub system_time: FileTime,
    pub server_time_zone: i16,
    pub challenge_length: u8,
}

#[derive(Debug)]
pub struct NegotiateResponse {
    pub words: NegotiateResponseWords,
    /// Raw data block: with extended security this is the server GUID plus
    /// an optional SPNEGO hint; otherwise the challenge and domain name.
    /// Either way the target server never verifies what we send back.
    pub security_buffer: Vec<u8>,
}

impl NegotiateResponse {
    pub fn parse(words: &[u8], data: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        let words = NegotiateResponseWords::read(&mut cursor)?;
        Ok(Self {
            words,
            security_buffer: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_data_is_tagged_dialect_string() {
        let data = NegotiateRequest::default().data().unwrap();
        assert_eq!(
            data,
            [
                0x02, b'N', b'T', b' ', b'L', b'M', b' ', b'0', b'.', b'1', b'2', 0x00,
            ]
        );
        assert!(NegotiateRequest::default().words().unwrap().is_empty());
    }

    #[test]
    fn response_words_parse() {
        // Dialect 0, user security, 64KiB buffers, ext-sec capabilities.
        let mut words = Vec::new();
        words.extend_from_slice(&0u16.to_le_bytes()); // dialect index
        words.push(0x03); // security mode
        words.extend_from_slice(&50u16.to_le_bytes()); // max mpx
        words.extend_from_slice(&1u16.to_le_bytes()); // max vcs
        words.extend_from_slice(&0x00010000u32.to_le_bytes()); // max buffer
        words.extend_from_slice(&0x00010000u32.to_le_bytes()); // max raw
        words.extend_from_slice(&0u32.to_le_bytes()); // session key
        words.extend_from_slice(&0x8000E3FDu32.to_le_bytes()); // capabilities
        words.extend_from_slice(&0u64.to_le_bytes()); // system time
        words.extend_from_slice(&0i16.to_le_bytes()); // time zone
        words.push(0); // challenge length

        let response = NegotiateResponse::parse(&words, &[0xAA; 16]).unwrap();
        assert_eq!(response.words.dialect_index, 0);
        assert_eq!(response.words.max_buffer_size, 0x10000);
        assert!(response.words.capabilities.extended_security());
        assert!(response.words.capabilities.unicode());
        assert!(response.words.security_mode.user_security());
        assert_eq!(response.security_buffer.len(), 16);
    }
}
