use std::string::FromUtf16Error;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmbMsgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Binrw error: {0}")]
    BinRw(#[from] binrw::Error),
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Invalid UTF-16 string: {0}")]
    Utf16(#[from] FromUtf16Error),
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}
