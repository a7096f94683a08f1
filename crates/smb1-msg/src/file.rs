//! File I/O verbs: `SMB_COM_READ_ANDX` (0x2E), `SMB_COM_WRITE_ANDX` (0x2F)
//! and `SMB_COM_CLOSE` (0x04).

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::SmbMsgError;
use crate::header::{AndX, Command, SmbHeader};
use crate::Request;

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct ReadAndxWords {
    andx: AndX,
    fid: u16,
    offset_low: u32,
    max_count: u16,
    min_count: u16,
    #[bw(calc = 0)]
    _timeout: u32,
    #[bw(calc = 0)]
    _remaining: u16,
    offset_high: u32,
}

#[derive(Debug)]
pub struct ReadAndxRequest {
    pub fid: u16,
    pub offset: u64,
    pub length: u16,
}

impl Request for ReadAndxRequest {
    const COMMAND: Command = Command::ReadAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let words = ReadAndxWords {
            andx: AndX::default(),
            fid: self.fid,
            offset_low: self.offset as u32,
            max_count: self.length,
            min_count: 0,
            offset_high: (self.offset >> 32) as u32,
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct ReadAndxResponseWords {
    andx: AndX,
    available: u16,
    #[bw(calc = 0)]
    _data_compaction_mode: u16,
    #[bw(calc = 0)]
    _reserved1: u16,
    data_length: u16,
    data_offset: u16,
    data_length_high: u16,
    #[bw(calc = [0u16; 4])]
    _reserved2: [u16; 4],
}

#[derive(Debug)]
pub struct ReadAndxResponse {
    pub data: Vec<u8>,
}

impl ReadAndxResponse {
    /// Extracts the payload. `raw` is the whole SMB message (header at
    /// offset 0) since `data_offset` is header-relative.
    pub fn parse(words: &[u8], raw: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        let words = ReadAndxResponseWords::read(&mut cursor)?;
        let length = words.data_length as usize | ((words.data_length_high as usize) << 16);
        let start = words.data_offset as usize;
        let end = start
            .checked_add(length)
            .ok_or_else(|| SmbMsgError::Malformed("read data range overflow".into()))?;
        if end > raw.len() {
            return Err(SmbMsgError::Malformed(format!(
                "read data [{start}..{end}] escapes a {} byte message",
                raw.len()
            )));
        }
        Ok(Self {
            data: raw[start..end].to_vec(),
        })
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct WriteAndxWords {
    andx: AndX,
    fid: u16,
    offset_low: u32,
    #[bw(calc = 0)]
    _timeout: u32,
    #[bw(calc = 0)]
    _write_mode: u16,
    #[bw(calc = 0)]
    _remaining: u16,
    data_length_high: u16,
    data_length: u16,
    data_offset: u16,
    offset_high: u32,
}

#[derive(Debug)]
pub struct WriteAndxRequest {
    pub fid: u16,
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl WriteAndxRequest {
    /// The 14 parameter words put the data block at absolute offset 63;
    /// one pad byte starts the payload at 64.
    const DATA_OFFSET: usize = SmbHeader::SIZE + 1 + 28 + 2;
    const PAYLOAD_OFFSET: u16 = (Self::DATA_OFFSET + 1) as u16;
}

impl Request for WriteAndxRequest {
    const COMMAND: Command = Command::WriteAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let length = u32::try_from(self.payload.len())
            .map_err(|_| SmbMsgError::OutOfRange("write payload too large".into()))?;
        let words = WriteAndxWords {
            andx: AndX::default(),
            fid: self.fid,
            offset_low: self.offset as u32,
            data_length_high: (length >> 16) as u16,
            data_length: length as u16,
            data_offset: Self::PAYLOAD_OFFSET,
            offset_high: (self.offset >> 32) as u32,
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut data = Vec::with_capacity(self.payload.len() + 1);
        data.push(0); // pad so the payload starts even-aligned
        data.extend_from_slice(&self.payload);
        Ok(data)
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct WriteAndxResponse {
    pub andx: AndX,
    pub count: u16,
    pub remaining: u16,
    pub count_high: u16,
    #[bw(calc = 0)]
    _reserved: u16,
}

impl WriteAndxResponse {
    pub fn parse(words: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        Ok(Self::read(&mut cursor)?)
    }

    pub fn bytes_written(&self) -> u32 {
        self.count as u32 | ((self.count_high as u32) << 16)
    }
}

/// `SMB_COM_CLOSE`: release a FID. A zero timestamp leaves the last-write
/// time to the server.
#[derive(Debug)]
pub struct CloseRequest {
    pub fid: u16,
}

impl Request for CloseRequest {
    const COMMAND: Command = Command::Close;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut words = Vec::with_capacity(6);
        words.extend_from_slice(&self.fid.to_le_bytes());
        words.extend_from_slice(&0u32.to_le_bytes());
        Ok(words)
    }
}
