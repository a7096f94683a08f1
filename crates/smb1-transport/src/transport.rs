//! Timeout-bounded NBSS frame I/O over a TCP stream.

use std::io::Cursor;
use std::time::Duration;

use binrw::prelude::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::netbios::{NbssFrameHeader, NbssFrameType, NetBiosName, SessionRequest};
use crate::{Result, TransportError};

/// An established NBSS transport. Owns the stream exclusively; callers get
/// whole frames in and out, nothing above that.
pub struct NetBiosTransport<S = TcpStream> {
    stream: S,
    timeout: Duration,
}

impl NetBiosTransport<TcpStream> {
    /// Opens a TCP connection, bounded by `timeout`.
    pub async fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        Ok(Self { stream, timeout })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> NetBiosTransport<S> {
    /// Wraps an already-connected stream. Used by tests to drive the
    /// transport over an in-process duplex pipe.
    pub fn from_stream(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    /// Performs the NBSS session establishment handshake.
    pub async fn request_session(
        &mut self,
        called_name: &NetBiosName,
        calling_name: &NetBiosName,
    ) -> Result<()> {
        log::debug!("Requesting NBSS session: {called_name} <- {calling_name}");
        let request = SessionRequest {
            called_name: called_name.clone(),
            calling_name: calling_name.clone(),
        };
        let mut cursor = Cursor::new(Vec::new());
        request.write_le(&mut cursor)?;
        self.write_frame(NbssFrameType::SessionRequest, &cursor.into_inner())
            .await?;

        let (header, payload) = self.read_frame().await?;
        match header.frame_type {
            NbssFrameType::PositiveSessionResponse => Ok(()),
            NbssFrameType::NegativeSessionResponse => Err(TransportError::SessionRefused {
                code: payload.first().copied().unwrap_or(0),
            }),
            other => Err(TransportError::UnexpectedFrame {
                expected: "positive or negative session response",
                got: other as u8,
            }),
        }
    }

    /// Sends one SMB payload wrapped in a SESSION_MESSAGE frame.
    pub async fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        self.write_frame(NbssFrameType::SessionMessage, payload)
            .await
    }

    /// Receives the next SESSION_MESSAGE payload, skipping keep-alives.
    pub async fn recv_message(&mut self) -> Result<Vec<u8>> {
        loop {
            let (header, payload) = self.read_frame().await?;
            match header.frame_type {
                NbssFrameType::SessionMessage => return Ok(payload),
                NbssFrameType::SessionKeepAlive => {
                    log::debug!("Skipping NBSS keep-alive");
                }
                other => {
                    return Err(TransportError::UnexpectedFrame {
                        expected: "session message",
                        got: other as u8,
                    });
                }
            }
        }
    }

    /// Shuts the stream down. NBSS has no goodbye frame; TCP close is it.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn write_frame(&mut self, frame_type: NbssFrameType, payload: &[u8]) -> Result<()> {
        let header = NbssFrameHeader::new(frame_type, payload.len())?;
        let mut frame = Cursor::new(Vec::with_capacity(NbssFrameHeader::SIZE + payload.len()));
        header.write(&mut frame)?;
        let mut frame = frame.into_inner();
        frame.extend_from_slice(payload);

        tokio::time::timeout(self.timeout, self.stream.write_all(&frame))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<(NbssFrameHeader, Vec<u8>)> {
        let mut header_bytes = [0u8; NbssFrameHeader::SIZE];
        tokio::time::timeout(self.timeout, self.stream.read_exact(&mut header_bytes))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        let header = NbssFrameHeader::read(&mut Cursor::new(header_bytes))?;

        let mut payload = vec![0u8; header.payload_length()];
        if !payload.is_empty() {
            tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload))
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))??;
        }
        log::trace!(
            "NBSS frame in: type {:#04x}, {} bytes",
            header.frame_type as u8,
            payload.len()
        );
        Ok((header, payload))
    }
}
