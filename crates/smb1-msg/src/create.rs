//! `SMB_COM_NT_CREATE_ANDX` (0xA2): open or create a file or directory.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::binrw_util::{utf16le_bytes, FileTime};
use crate::error::SmbMsgError;
use crate::header::{AndX, Command, SmbHeader};
use crate::Request;

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct DesiredAccess {
    pub read_data: bool,
    pub write_data: bool,
    pub append_data: bool,
    pub read_ea: bool,
    pub write_ea: bool,
    pub execute: bool,
    pub delete_child: bool,
    pub read_attributes: bool,
    pub write_attributes: bool,
    #[skip]
    __: B7,
    pub delete: bool,
    pub read_control: bool,
    pub write_dac: bool,
    pub write_owner: bool,
    pub synchronize: bool,
    #[skip]
    __: B3,
    pub system_security: bool,
    pub maximum_allowed: bool,
    #[skip]
    __: B2,
    pub generic_all: bool,
    pub generic_execute: bool,
    pub generic_write: bool,
    pub generic_read: bool,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct FileAttributes {
    pub readonly: bool,
    pub hidden: bool,
    pub system: bool,
    #[skip]
    __: B1,
    pub directory: bool,
    pub archive: bool,
    pub device: bool,
    pub normal: bool,
    pub temporary: bool,
    pub sparse: bool,
    pub reparse_point: bool,
    pub compressed: bool,
    pub offline: bool,
    pub not_content_indexed: bool,
    pub encrypted: bool,
    #[skip]
    __: B17,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct ShareAccess {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    #[skip]
    __: B29,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct CreateOptions {
    pub directory_file: bool,
    pub write_through: bool,
    pub sequential_only: bool,
    pub no_intermediate_buffering: bool,
    pub sync_io_alert: bool,
    pub sync_io_nonalert: bool,
    pub non_directory_file: bool,
    #[skip]
    __: B25,
}

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(little, repr(u32))]
pub enum CreateDisposition {
    Supersede = 0,
    Open = 1,
    Create = 2,
    OpenIf = 3,
    Overwrite = 4,
    OverwriteIf = 5,
}

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(little, repr(u32))]
pub enum ImpersonationLevel {
    Anonymous = 0,
    Identification = 1,
    Impersonation = 2,
    Delegation = 3,
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct NtCreateWords {
    andx: AndX,
    #[bw(calc = 0)]
    _reserved: u8,
    name_length: u16,
    #[bw(calc = 0)]
    _flags: u32,
    #[bw(calc = 0)]
    _root_directory_fid: u32,
    desired_access: DesiredAccess,
    #[bw(calc = 0)]
    _allocation_size: u64,
    file_attributes: FileAttributes,
    share_access: ShareAccess,
    create_disposition: CreateDisposition,
    create_options: CreateOptions,
    impersonation_level: ImpersonationLevel,
    #[bw(calc = 0)]
    _security_flags: u8,
}

#[derive(Debug)]
pub struct NtCreateAndxRequest {
    pub path: String,
    pub desired_access: DesiredAccess,
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
}

impl NtCreateAndxRequest {
    const DATA_OFFSET: usize = SmbHeader::SIZE + 1 + 48 + 2;
}

impl Request for NtCreateAndxRequest {
    const COMMAND: Command = Command::NtCreateAndx;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        let name_bytes = utf16le_bytes(&self.path);
        let name_length = u16::try_from(name_bytes.len())
            .map_err(|_| SmbMsgError::OutOfRange("path too long".into()))?;
        let words = NtCreateWords {
            andx: AndX::default(),
            name_length,
            desired_access: self.desired_access,
            file_attributes: self.file_attributes,
            share_access: self.share_access,
            create_disposition: self.create_disposition,
            create_options: self.create_options,
            impersonation_level: ImpersonationLevel::Impersonation,
        };
        let mut cursor = Cursor::new(Vec::new());
        words.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut data = Vec::new();
        // The 24 parameter words leave the data block at an odd absolute
        // offset; one pad byte brings the UTF-16 name to an even one.
        if (Self::DATA_OFFSET + data.len()) % 2 != 0 {
            data.push(0);
        }
        data.extend_from_slice(&utf16le_bytes(&self.path));
        data.extend_from_slice(&[0, 0]);
        Ok(data)
    }
}

/// NT_CREATE_ANDX response (WordCount 34). Servers answering the extended
/// form append more words; only this prefix is consumed.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct NtCreateAndxResponse {
    pub andx: AndX,
    pub oplock_level: u8,
    pub fid: u16,
    pub create_disposition: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub file_attributes: FileAttributes,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_type: u16,
    pub device_state: u16,
    #[br(map = |b: u8| b != 0)]
    #[bw(map = |&b| b as u8)]
    pub directory: bool,
}

impl NtCreateAndxResponse {
    pub fn parse(words: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(words);
        Ok(Self::read(&mut cursor)?)
    }
}
