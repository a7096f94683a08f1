//! Shared binrw helpers for SMB1 structures.

mod file_time;
mod wide_string;

pub use file_time::FileTime;
pub use wide_string::{BufferFormatPath, SizedWideString, utf16le_bytes};
