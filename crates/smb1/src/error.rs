use smb1_msg::header::Command;
use smb1_msg::{SmbMsgError, Status};
use smb1_transport::TransportError;
use thiserror::Error;

use crate::connection::ConnectionState;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("SMB message error: {0}")]
    Msg(#[from] SmbMsgError),
    #[error("Binrw error: {0}")]
    BinRw(#[from] binrw::Error),
    #[error("Protocol violation: {0}")]
    Protocol(String),
    #[error("Unexpected MID {got} (expected {expected})")]
    MidMismatch { expected: u16, got: u16 },
    #[error("Unexpected command {got} in response to {expected}")]
    UnexpectedCommand { expected: Command, got: Command },
    #[error("{command} failed with {}", Status::try_display_as_status(*.status))]
    ServerStatus { command: Command, status: u32 },
    #[error("Cannot {operation} while the connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Client is not connected")]
    NotConnected,
}

impl Error {
    /// The NT status carried by a server error response, if any.
    pub fn server_status(&self) -> Option<u32> {
        match self {
            Error::ServerStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn is_status(&self, status: Status) -> bool {
        self.server_status() == Some(status as u32)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
