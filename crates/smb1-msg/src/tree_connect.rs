//! `SMB_COM_TREE_CONNECT_ANDX` (0x75) and `SMB_COM_TREE_DISCONNECT` (0x71).

use std::io::Cursor;

use binrw::prelude::*;

use crate::binrw_util::utf16le_bytes;
use crate::error::SmbMsgError;
use crate::header::{AndX, Command, SmbHeader};
use crate::Request;

/// The service string for the share. `?????` lets the server pick; the
/// microSD share always resolves to a disk tree.
pub const SERVICE_ANY: &str = "?????";

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct TreeConnectWords {
    andx: AndX,
    flags: u16,
    password_length: u16,
}

#[derive(Debug)]
pub struct TreeConnectAndxRequest {
    /// UNC path of the share, e.g. `\\3DS-1234\microSD`.
    pub path: String,
    pub service: String,
}

impl TreeConnectAndxRequest {
    const DATA_OFFSET: usize = SmbHeader::SIZE + 1 + 8 + 2;

    pub fn new(server_name: &str, share: &str) -> Self {
        Self {
            path: format!("\\\\{server_name}\\{share}"),
            service: SERVICE_ANY.to_string(),
        }
    }
}

impl Request for TreeConnectAndxRequest {
    const COMMAND: Command = Command::TreeConnectAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let words = TreeConnectWords {
            andx: AndX::default(),
            flags: 0,
            password_length: 1,
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        // A single NUL stands in for the password; the server never checks it.
        let mut data = vec![0u8];
        if (Self::DATA_OFFSET + data.len()) % 2 != 0 {
            data.push(0);
        }
        data.extend_from_slice(&utf16le_bytes(&self.path));
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(self.service.as_bytes());
        data.push(0);
        Ok(data)
    }
}

/// Parameter words of the tree connect response. The granted TID arrives in
/// the response header.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct TreeConnectAndxResponse {
    pub andx: AndX,
    pub optional_support: u16,
}

impl TreeConnectAndxResponse {
    pub fn parse(words: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        Ok(Self::read(&mut cursor)?)
    }
}

/// `SMB_COM_TREE_DISCONNECT`: no parameters, no data.
#[derive(Debug, Default)]
pub struct TreeDisconnectRequest;

impl Request for TreeDisconnectRequest {
    const COMMAND: Command = Command::TreeDisconnect;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(Vec::new())
    }
}
