//! `SMB_COM_SESSION_SETUP_ANDX` (0x73) and `SMB_COM_LOGOFF_ANDX` (0x74).
//!
//! The setup request carries an extended-security blob (see
//! [`crate::ntlm`]); the microSD Management server accepts it without
//! verification and grants a UID in a single round trip.

use std::io::Cursor;

use binrw::prelude::*;

use crate::binrw_util::utf16le_bytes;
use crate::error::SmbMsgError;
use crate::header::{AndX, Command, SmbHeader};
use crate::negotiate::Capabilities;
use crate::Request;

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct SessionSetupWords {
    andx: AndX,
    max_buffer_size: u16,
    max_mpx_count: u16,
    vc_number: u16,
    session_key: u32,
    security_blob_length: u16,
    #[bw(calc = 0)]
    _reserved: u32,
    capabilities: Capabilities,
}

#[derive(Debug)]
pub struct SessionSetupAndxRequest {
    pub max_buffer_size: u16,
    pub max_mpx_count: u16,
    pub security_blob: Vec<u8>,
    pub native_os: String,
    pub native_lan_man: String,
}

impl SessionSetupAndxRequest {
    /// Absolute offset of this command's data block from the SMB header
    /// start: header + WordCount + 12 parameter words + ByteCount.
    const DATA_OFFSET: usize = SmbHeader::SIZE + 1 + 24 + 2;

    pub fn new(security_blob: Vec<u8>, max_buffer_size: u16) -> Self {
        Self {
            max_buffer_size,
            max_mpx_count: 1,
            security_blob,
            native_os: String::new(),
            native_lan_man: String::new(),
        }
    }
}

impl Request for SessionSetupAndxRequest {
    const COMMAND: Command = Command::SessionSetupAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let blob_length = u16::try_from(self.security_blob.len())
            .map_err(|_| SmbMsgError::OutOfRange("security blob over 64KiB".into()))?;
        let words = SessionSetupWords {
            andx: AndX::default(),
            max_buffer_size: self.max_buffer_size,
            max_mpx_count: self.max_mpx_count,
            vc_number: 0,
            session_key: 0,
            security_blob_length: blob_length,
            capabilities: Capabilities::new()
                .with_unicode(true)
                .with_large_files(true)
                .with_nt_smbs(true)
                .with_nt_status(true),
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut data = self.security_blob.clone();
        // Native OS/LanMan strings must start on an even absolute offset.
        if (Self::DATA_OFFSET + data.len()) % 2 != 0 {
            data.push(0);
        }
        data.extend_from_slice(&utf16le_bytes(&self.native_os));
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&utf16le_bytes(&self.native_lan_man));
        data.extend_from_slice(&[0, 0]);
        Ok(data)
    }
}

/// Parameter words of the setup response (WordCount 4). The granted UID
/// arrives in the response header, not here.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupAndxResponse {
    pub andx: AndX,
    pub action: u16,
    pub security_blob_length: u16,
}

impl SessionSetupAndxResponse {
    const ACTION_GUEST: u16 = 0x0001;

    pub fn parse(words: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        Ok(Self::read(&mut cursor)?)
    }

    pub fn logged_in_as_guest(&self) -> bool {
        self.action & Self::ACTION_GUEST != 0
    }
}

/// `SMB_COM_LOGOFF_ANDX`: two parameter words, no data.
#[derive(Debug, Default)]
pub struct LogoffAndxRequest;

impl Request for LogoffAndxRequest {
    const COMMAND: Command = Command::LogoffAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        AndX::default().write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_carry_blob_length_and_capabilities() {
        let request = SessionSetupAndxRequest::new(vec![0xAB; 10], 0xFFFF);
        let words = request.words().unwrap();
        assert_eq!(words.len(), 24);
        assert_eq!(&words[..4], &[0xFF, 0, 0, 0]); // no AndX chain
        assert_eq!(&words[14..16], &10u16.to_le_bytes()); // blob length
        assert_eq!(&words[20..24], &0x0000005Cu32.to_le_bytes()); // capabilities
    }

    #[test]
    fn data_aligns_trailing_strings() {
        // DATA_OFFSET is odd; an even blob leaves the strings misaligned,
        // so exactly one pad byte must be inserted.
        let request = SessionSetupAndxRequest::new(vec![0xAB; 8], 0xFFFF);
        let data = request.data().unwrap();
        assert_eq!(data.len(), 8 + 1 + 2 + 2);
        assert_eq!(data[8], 0);

        let request = SessionSetupAndxRequest::new(vec![0xAB; 9], 0xFFFF);
        let data = request.data().unwrap();
        assert_eq!(data.len(), 9 + 2 + 2);
    }

    #[test]
    fn response_guest_bit() {
        let words = [0xFFu8, 0, 0, 0, 0x01, 0, 0, 0];
        let response = SessionSetupAndxResponse::parse(&words).unwrap();
        assert!(response.logged_in_as_guest());
        assert_eq!(response.security_blob_length, 0);
    }
}
