//! `SMB_COM_ECHO` (0x2B), used as a liveness probe.

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::SmbMsgError;
use crate::header::Command;
use crate::Request;

#[derive(Debug)]
pub struct EchoRequest {
    pub echo_count: u16,
    pub payload: Vec<u8>,
}

impl EchoRequest {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            echo_count: 1,
            payload,
        }
    }
}

impl Request for EchoRequest {
    const COMMAND: Command = Command::Echo;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(self.echo_count.to_le_bytes().to_vec())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(self.payload.clone())
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct EchoResponse {
    pub sequence_number: u16,
}

impl EchoResponse {
    pub fn parse(words: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        Ok(Self::read(&mut cursor)?)
    }
}
