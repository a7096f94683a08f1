//! `SMB_COM_TRANSACTION2` (0x32) framing and the two subcommand families
//! the client uses: FIND_FIRST2/FIND_NEXT2 and QUERY_FS_INFORMATION.

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::SmbMsgError;
use crate::header::{Command, SmbHeader};
use crate::Request;

pub mod find;
pub mod fs_info;

pub use find::*;
pub use fs_info::*;

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(little, repr(u16))]
pub enum Trans2Subcommand {
    FindFirst2 = 0x0001,
    FindNext2 = 0x0002,
    QueryFsInformation = 0x0003,
}

/// A TRANSACTION2 request carrying one subcommand's parameter and data
/// blocks. The transaction is always sent whole (no secondary requests);
/// the parameter/data blocks this client produces are far below any
/// negotiated buffer size.
#[derive(Debug)]
pub struct Transaction2Request {
    pub subcommand: Trans2Subcommand,
    pub parameters: Vec<u8>,
    pub data: Vec<u8>,
    pub max_parameter_count: u16,
    pub max_data_count: u16,
}

impl Transaction2Request {
    /// 15 parameter words (14 fixed plus one setup word).
    const WORD_COUNT: usize = 15;
    const DATA_OFFSET: usize = SmbHeader::SIZE + 1 + 2 * Self::WORD_COUNT + 2;

    pub fn new(subcommand: Trans2Subcommand, parameters: Vec<u8>, max_data_count: u16) -> Self {
        Self {
            subcommand,
            parameters,
            data: Vec::new(),
            max_parameter_count: 16,
            max_data_count,
        }
    }

    fn parameter_offset(&self) -> usize {
        Self::DATA_OFFSET.next_multiple_of(4)
    }

    fn data_offset(&self) -> usize {
        (self.parameter_offset() + self.parameters.len()).next_multiple_of(4)
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct Transaction2Words {
    total_parameter_count: u16,
    total_data_count: u16,
    max_parameter_count: u16,
    max_data_count: u16,
    #[bw(calc = 0)]
    _max_setup_count: u8,
    #[bw(calc = 0)]
    _reserved: u8,
    #[bw(calc = 0)]
    _flags: u16,
    #[bw(calc = 0)]
    _timeout: u32,
    #[bw(calc = 0)]
    _reserved2: u16,
    parameter_count: u16,
    parameter_offset: u16,
    data_count: u16,
    data_offset: u16,
    #[bw(calc = 1)]
    _setup_count: u8,
    #[bw(calc = 0)]
    _reserved3: u8,
    subcommand: Trans2Subcommand,
}

impl Request for Transaction2Request {
    const COMMAND: Command = Command::Transaction2;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let parameter_count = u16::try_from(self.parameters.len())
            .map_err(|_| SmbMsgError::OutOfRange("transaction parameters too large".into()))?;
        let data_count = u16::try_from(self.data.len())
            .map_err(|_| SmbMsgError::OutOfRange("transaction data too large".into()))?;
        let words = Transaction2Words {
            total_parameter_count: parameter_count,
            total_data_count: data_count,
            max_parameter_count: self.max_parameter_count,
            max_data_count: self.max_data_count,
            parameter_count,
            parameter_offset: self.parameter_offset() as u16,
            data_count,
            data_offset: if self.data.is_empty() {
                0
            } else {
                self.data_offset() as u16
            },
            subcommand: self.subcommand,
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut out = vec![0u8; self.parameter_offset() - Self::DATA_OFFSET];
        out.extend_from_slice(&self.parameters);
        if !self.data.is_empty() {
            let pad = self.data_offset() - (self.parameter_offset() + self.parameters.len());
            out.extend(std::iter::repeat_n(0u8, pad));
            out.extend_from_slice(&self.data);
        }
        Ok(out)
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct Transaction2ResponseWords {
    total_parameter_count: u16,
    total_data_count: u16,
    #[bw(calc = 0)]
    _reserved: u16,
    parameter_count: u16,
    parameter_offset: u16,
    parameter_displacement: u16,
    data_count: u16,
    data_offset: u16,
    data_displacement: u16,
    #[bw(calc = 0)]
    _setup_count: u8,
    #[bw(calc = 0)]
    _reserved1: u8,
}

/// A decoded TRANSACTION2 response: the subcommand's parameter and data
/// blocks, extracted via their header-relative offsets.
#[derive(Debug)]
pub struct Transaction2Response {
    pub parameters: Vec<u8>,
    pub data: Vec<u8>,
}

impl Transaction2Response {
    pub fn parse(words: &[u8], raw: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        let words = Transaction2ResponseWords::read(&mut cursor)?;

        if words.parameter_count != words.total_parameter_count
            || words.data_count != words.total_data_count
            || words.parameter_displacement != 0
            || words.data_displacement != 0
        {
            return Err(SmbMsgError::Malformed(
                "fragmented transaction response".into(),
            ));
        }

        Ok(Self {
            parameters: Self::slice(raw, words.parameter_offset, words.parameter_count)?.to_vec(),
            data: Self::slice(raw, words.data_offset, words.data_count)?.to_vec(),
        })
    }

    fn slice(raw: &[u8], offset: u16, count: u16) -> Result<&[u8], SmbMsgError> {
        let start = offset as usize;
        let end = start + count as usize;
        if end > raw.len() {
            return Err(SmbMsgError::Malformed(format!(
                "transaction block [{start}..{end}] escapes a {} byte message",
                raw.len()
            )));
        }
        Ok(&raw[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_aligns_blocks_to_four() {
        let request = Transaction2Request {
            subcommand: Trans2Subcommand::FindFirst2,
            parameters: vec![0xAA; 13],
            data: vec![0xBB; 4],
            max_parameter_count: 16,
            max_data_count: 0x1000,
        };
        assert_eq!(Transaction2Request::DATA_OFFSET, 65);
        assert_eq!(request.parameter_offset(), 68);
        assert_eq!(request.data_offset(), 84);

        let data = request.data().unwrap();
        // 3 leading pad bytes, then parameters, then pad to 4, then data.
        assert_eq!(&data[..3], &[0, 0, 0]);
        assert_eq!(&data[3..16], &[0xAA; 13][..]);
        assert_eq!(&data[16..19], &[0, 0, 0]);
        assert_eq!(&data[19..], &[0xBB; 4][..]);

        let words = request.words().unwrap();
        assert_eq!(words.len(), 30);
        // parameter_offset and data_offset fields
        assert_eq!(&words[20..22], &68u16.to_le_bytes());
        assert_eq!(&words[24..26], &84u16.to_le_bytes());
        // setup word holds the subcommand
        assert_eq!(&words[28..30], &1u16.to_le_bytes());
    }

    #[test]
    fn response_extracts_blocks() {
        // 70-byte synthetic message: parameters at 40, data at 50.
        let mut raw = vec![0u8; 70];
        raw[40..44].copy_from_slice(&[1, 2, 3, 4]);
        raw[50..53].copy_from_slice(&[9, 9, 9]);

        let mut words = Vec::new();
        words.extend_from_slice(&4u16.to_le_bytes()); // total params
        words.extend_from_slice(&3u16.to_le_bytes()); // total data
        words.extend_from_slice(&0u16.to_le_bytes()); // reserved
        words.extend_from_slice(&4u16.to_le_bytes()); // param count
        words.extend_from_slice(&40u16.to_le_bytes()); // param offset
        words.extend_from_slice(&0u16.to_le_bytes()); // param displacement
        words.extend_from_slice(&3u16.to_le_bytes()); // data count
        words.extend_from_slice(&50u16.to_le_bytes()); // data offset
        words.extend_from_slice(&0u16.to_le_bytes()); // data displacement
        words.extend_from_slice(&[0, 0]); // setup count + reserved

        let response = Transaction2Response::parse(&words, &raw).unwrap();
        assert_eq!(response.parameters, [1, 2, 3, 4]);
        assert_eq!(response.data, [9, 9, 9]);
    }

    #[test]
    fn response_rejects_fragments() {
        let mut words = Vec::new();
        words.extend_from_slice(&100u16.to_le_bytes()); // total params
        words.extend_from_slice(&0u16.to_le_bytes());
        words.extend_from_slice(&0u16.to_le_bytes());
        words.extend_from_slice(&50u16.to_le_bytes()); // param count < total
        words.extend_from_slice(&[0u8; 12]);

        assert!(Transaction2Response::parse(&words, &[0u8; 200]).is_err());
    }
}
