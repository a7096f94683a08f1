use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Binrw error: {0}")]
    BinRw(#[from] binrw::Error),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Server refused the NetBIOS session (error code {code:#04x})")]
    SessionRefused { code: u8 },
    #[error("Unexpected NBSS frame type {got:#04x}, expected {expected}")]
    UnexpectedFrame { expected: &'static str, got: u8 },
    #[error("NBSS payload of {0} bytes exceeds the 17-bit frame limit")]
    FrameTooLarge(usize),
    #[error("Invalid NetBIOS name: {0}")]
    InvalidName(String),
    #[error("Invalid endpoint: {0}")]
    InvalidAddress(String),
    #[error("Transport is closed")]
    Closed,
}
