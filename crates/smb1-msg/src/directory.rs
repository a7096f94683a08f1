//! Path-addressed verbs: `SMB_COM_DELETE` (0x06), `SMB_COM_RENAME` (0x07)
//! and `SMB_COM_DELETE_DIRECTORY` (0x01).
//!
//! All three carry `BufferFormat`-tagged UTF-16LE paths in their data block,
//! written through [`BufferFormatPath`] so the server's data-block-relative
//! alignment requirement is always satisfied.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::binrw_util::BufferFormatPath;
use crate::error::SmbMsgError;
use crate::header::Command;
use crate::Request;

/// `SMB_FILE_ATTRIBUTES` search mask.
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct SearchAttributes {
    pub readonly: bool,
    pub hidden: bool,
    pub system: bool,
    pub volume: bool,
    pub directory: bool,
    pub archive: bool,
    #[skip]
    __: B10,
}

impl SearchAttributes {
    /// Hidden + system, so every regular file is reachable.
    pub fn any_file() -> Self {
        Self::new().with_hidden(true).with_system(true)
    }

    /// Adds the directory bit for operations that may touch either kind.
    pub fn any_entry() -> Self {
        Self::any_file().with_directory(true)
    }
}

#[derive(Debug)]
pub struct DeleteRequest {
    pub path: String,
    pub search_attributes: SearchAttributes,
}

impl DeleteRequest {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            search_attributes: SearchAttributes::any_file(),
        }
    }
}

impl Request for DeleteRequest {
    const COMMAND: Command = Command::Delete;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        self.search_attributes.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        BufferFormatPath::new(&self.path).write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[derive(Debug)]
pub struct RenameRequest {
    pub old_path: String,
    pub new_path: String,
    pub search_attributes: SearchAttributes,
}

impl RenameRequest {
    pub fn new(old_path: &str, new_path: &str) -> Self {
        Self {
            old_path: old_path.to_string(),
            new_path: new_path.to_string(),
            search_attributes: SearchAttributes::any_entry(),
        }
    }
}

impl Request for RenameRequest {
    const COMMAND: Command = Command::Rename;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        self.search_attributes.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        BufferFormatPath::new(&self.old_path).write_le(&mut cursor)?;
        BufferFormatPath::new(&self.new_path).write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[derive(Debug)]
pub struct DeleteDirectoryRequest {
    pub path: String,
}

impl DeleteDirectoryRequest {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl Request for DeleteDirectoryRequest {
    const COMMAND: Command = Command::DeleteDirectory;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(Vec::new())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        BufferFormatPath::new(&self.path).write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}
