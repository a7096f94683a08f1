//! NetBIOS Session Service (NBSS) transport.
//!
//! One NBSS session over one TCP connection to port 139, carrying opaque
//! SMB1 payloads in `SESSION_MESSAGE` frames. Frame I/O is timeout-bounded;
//! a timeout poisons the stream and is surfaced as
//! [`TransportError::Timeout`].

pub mod error;
pub mod netbios;
pub mod transport;

pub use error::TransportError;
pub use netbios::{NetBiosName, FILE_SERVER_SUFFIX, WORKSTATION_SUFFIX};
pub use transport::NetBiosTransport;

/// The NetBIOS session service TCP port.
pub const NBSS_PORT: u16 = 139;

pub type Result<T> = std::result::Result<T, TransportError>;
