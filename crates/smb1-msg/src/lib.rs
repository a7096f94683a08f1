//! SMB1 (CIFS) message structures.
//!
//! This crate contains the wire-level request and response structures for the
//! small SMB1 command subset spoken by the 3DS microSD Management server,
//! declared with [`binrw`]. Multi-byte fields are little-endian throughout,
//! and strings are UTF-16LE (the client always negotiates Unicode).

pub mod binrw_util;
pub mod create;
pub mod directory;
pub mod echo;
pub mod error;
pub mod file;
pub mod header;
pub mod negotiate;
pub mod ntlm;
pub mod session_setup;
pub mod status;
pub mod trans2;
pub mod tree_connect;

pub use binrw_util::*;
pub use create::*;
pub use directory::*;
pub use echo::*;
pub use error::SmbMsgError;
pub use file::*;
pub use header::*;
pub use negotiate::*;
pub use session_setup::*;
pub use status::Status;
pub use trans2::*;
pub use tree_connect::*;

/// A request body: parameter words plus an optional data block.
///
/// The connection layer prepends the SMB header and the WordCount/ByteCount
/// framing; implementations only serialize their own fields.
pub trait Request {
    const COMMAND: header::Command;

    /// Serialized parameter words, without the leading WordCount byte.
    fn words(&self) -> Result<Vec<u8>, SmbMsgError>;

    /// Serialized data block, without the leading ByteCount field.
    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(Vec::new())
    }
}
