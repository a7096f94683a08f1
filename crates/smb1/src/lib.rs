//! SMB1 client for the 3DS microSD Management server.
//!
//! The server is a minimal, quirky CIFS implementation: it accepts a single
//! session, ignores the NTLM token it is handed, and wants the UTF-16LE
//! paths of DELETE/RENAME aligned relative to the data block rather than
//! the header. This crate speaks exactly that dialect: NBSS over TCP 139,
//! `NT LM 0.12`, and the dozen command verbs needed to browse and transfer
//! files.
//!
//! ```no_run
//! use smb1::{Client, Result};
//!
//! async fn list_root(ip: std::net::Ipv4Addr, name: &str) -> Result<()> {
//!     let mut client = Client::new(ip, name);
//!     client.connect().await?;
//!     for entry in client.listdir("\\").await? {
//!         println!("{} {}", if entry.is_dir { "d" } else { "-" }, entry.name);
//!     }
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
mod path;
pub mod resource;

pub use client::Client;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, Response};
pub use error::{Error, Result};
pub use resource::{Access, DirectoryEntry, DiskInfo, Disposition, FileHandle};
