//! The per-connection SMB1 engine: one NBSS transport, the
//! TID/UID/PID/MID multiplex tuple, and the single-plex request/response
//! cycle with MID correlation.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use binrw::prelude::*;
use smb1_msg::header::{Command, SmbHeader};
use smb1_msg::Request;
use smb1_transport::{NetBiosName, NetBiosTransport};

use crate::error::{Error, Result};

/// Connection lifecycle. Most verbs are legal only in `Ready`; any fatal
/// I/O or protocol error drops straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    TcpOpen,
    NbssReady,
    Negotiated,
    Authed,
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::TcpOpen => "tcp-open",
            ConnectionState::NbssReady => "nbss-ready",
            ConnectionState::Negotiated => "negotiated",
            ConnectionState::Authed => "authenticated",
            ConnectionState::Ready => "ready",
        };
        write!(f, "{name}")
    }
}

/// A decoded response: header plus the parameter words and data block,
/// split out by their WordCount/ByteCount framing. `raw` keeps the whole
/// message for commands whose payload offsets are header-relative.
#[derive(Debug)]
pub struct Response {
    pub header: SmbHeader,
    pub words: Vec<u8>,
    pub data: Vec<u8>,
    pub raw: Vec<u8>,
}

impl Response {
    pub fn status(&self) -> u32 {
        self.header.status
    }

    /// Converts a server error status into [`Error::ServerStatus`].
    pub fn expect_success(self) -> Result<Response> {
        if self.header.status != 0 {
            return Err(Error::ServerStatus {
                command: self.header.command,
                status: self.header.status,
            });
        }
        Ok(self)
    }
}

pub struct Connection {
    transport: Option<NetBiosTransport>,
    state: ConnectionState,
    tid: u16,
    uid: u16,
    pid: u16,
    next_mid: u16,
    max_buffer_size: u32,
}

impl Connection {
    /// Header overhead subtracted from the negotiated buffer size when
    /// chunking reads and writes.
    const IO_OVERHEAD: u32 = 64;
    /// Chunks stay within the 16-bit count fields of READ/WRITE_ANDX.
    const MAX_IO_CHUNK: u32 = 0xF000;
    /// Fixed framing around a TRANSACTION2 response, subtracted from the
    /// negotiated buffer when sizing `max_data_count`.
    pub(crate) const TRANSACTION_OVERHEAD: u32 = 100;

    /// Opens the TCP connection. The PID is chosen here and stays constant
    /// for the life of the connection.
    pub async fn open(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let transport = NetBiosTransport::connect(addr, timeout).await?;
        log::debug!("TCP connection to {addr} established");
        Ok(Self {
            transport: Some(transport),
            state: ConnectionState::TcpOpen,
            tid: 0,
            uid: 0,
            pid: rand::random(),
            next_mid: 1,
            max_buffer_size: 0,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn max_buffer_size(&self) -> u32 {
        self.max_buffer_size
    }

    /// Largest read/write payload for one request.
    pub fn max_io_chunk(&self) -> usize {
        self.max_buffer_size
            .saturating_sub(Self::IO_OVERHEAD)
            .clamp(512, Self::MAX_IO_CHUNK) as usize
    }

    /// NBSS session establishment. A refusal is fatal for the connection.
    pub async fn request_session(
        &mut self,
        called_name: &NetBiosName,
        calling_name: &NetBiosName,
    ) -> Result<()> {
        self.expect_state(ConnectionState::TcpOpen, "request a session")?;
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        match transport.request_session(called_name, calling_name).await {
            Ok(()) => {
                self.state = ConnectionState::NbssReady;
                Ok(())
            }
            Err(e) => {
                self.abort();
                Err(e.into())
            }
        }
    }

    pub(crate) fn mark_negotiated(&mut self, max_buffer_size: u32) {
        self.max_buffer_size = max_buffer_size;
        self.state = ConnectionState::Negotiated;
    }

    pub(crate) fn mark_authed(&mut self, uid: u16) {
        self.uid = uid;
        self.state = ConnectionState::Authed;
    }

    pub(crate) fn mark_ready(&mut self, tid: u16) {
        self.tid = tid;
        self.state = ConnectionState::Ready;
    }

    pub(crate) fn expect_state(
        &self,
        expected: ConnectionState,
        operation: &'static str,
    ) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Sends one request and reads its response, validating the MID and
    /// command correlation. Exactly one request is ever outstanding; a
    /// mismatch means the stream is desynchronized and the connection is
    /// torn down rather than resynchronized.
    pub async fn send_recv<R: Request>(&mut self, request: &R) -> Result<Response> {
        if matches!(
            self.state,
            ConnectionState::Closed | ConnectionState::TcpOpen
        ) {
            return Err(Error::InvalidState {
                operation: "send a message",
                state: self.state,
            });
        }

        let mid = self.next_mid;
        self.next_mid = self.next_mid.wrapping_add(1);

        let result = self.send_recv_inner(request, mid).await;
        if result.is_err() {
            self.abort();
        }
        result
    }

    async fn send_recv_inner<R: Request>(&mut self, request: &R, mid: u16) -> Result<Response> {
        let message = self.build_message(R::COMMAND, mid, request)?;
        log::trace!(
            "-> {} (mid {mid}, {} bytes)",
            R::COMMAND,
            message.len()
        );

        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        transport.send_message(&message).await?;
        let raw = transport.recv_message().await?;

        let response = Self::parse_message(raw)?;
        if response.header.mid != mid {
            return Err(Error::MidMismatch {
                expected: mid,
                got: response.header.mid,
            });
        }
        if response.header.command != R::COMMAND {
            return Err(Error::UnexpectedCommand {
                expected: R::COMMAND,
                got: response.header.command,
            });
        }
        log::trace!(
            "<- {} (status {:#010x}, {} words, {} data bytes)",
            response.header.command,
            response.header.status,
            response.words.len(),
            response.data.len()
        );
        Ok(response)
    }

    fn build_message<R: Request>(
        &self,
        command: Command,
        mid: u16,
        request: &R,
    ) -> Result<Vec<u8>> {
        let words = request.words()?;
        let data = request.data()?;
        if words.len() % 2 != 0 || words.len() / 2 > u8::MAX as usize {
            return Err(Error::Protocol(format!(
                "invalid parameter block of {} bytes for {command}",
                words.len()
            )));
        }
        let byte_count = u16::try_from(data.len()).map_err(|_| {
            Error::Protocol(format!(
                "data block of {} bytes exceeds ByteCount for {command}",
                data.len()
            ))
        })?;

        let header = SmbHeader {
            command,
            status: 0,
            flags: SmbHeader::request_flags(),
            flags2: SmbHeader::request_flags2(),
            tid: self.tid,
            pid: self.pid,
            uid: self.uid,
            mid,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(
            SmbHeader::SIZE + 3 + words.len() + data.len(),
        ));
        header.write(&mut cursor)?;
        let mut message = cursor.into_inner();
        message.push((words.len() / 2) as u8);
        message.extend_from_slice(&words);
        message.extend_from_slice(&byte_count.to_le_bytes());
        message.extend_from_slice(&data);
        Ok(message)
    }

    fn parse_message(raw: Vec<u8>) -> Result<Response> {
        let mut cursor = Cursor::new(&raw);
        let header = SmbHeader::read(&mut cursor)
            .map_err(|e| Error::Protocol(format!("bad SMB header: {e}")))?;

        let word_count = cursor.position() as usize;
        let words_len = *raw
            .get(word_count)
            .ok_or_else(|| Error::Protocol("message truncated at WordCount".into()))?
            as usize
            * 2;
        let words_start = word_count + 1;
        let byte_count_at = words_start + words_len;
        if byte_count_at + 2 > raw.len() {
            return Err(Error::Protocol("message truncated in parameter block".into()));
        }
        let data_len =
            u16::from_le_bytes([raw[byte_count_at], raw[byte_count_at + 1]]) as usize;
        let data_start = byte_count_at + 2;
        if data_start + data_len > raw.len() {
            return Err(Error::Protocol("message truncated in data block".into()));
        }

        Ok(Response {
            header,
            words: raw[words_start..byte_count_at].to_vec(),
            data: raw[data_start..data_start + data_len].to_vec(),
            raw,
        })
    }

    /// Tears the connection down without any protocol goodbye.
    pub fn abort(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Closed;
    }

    /// Closes the underlying stream. The protocol-level goodbye
    /// (TREE_DISCONNECT, LOGOFF_ANDX) is the client's job.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                log::debug!("Error shutting down transport: {e}");
            }
        }
        self.state = ConnectionState::Closed;
    }
}
