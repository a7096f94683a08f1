//! TRANS2 FIND_FIRST2 / FIND_NEXT2 with `SMB_FIND_FILE_BOTH_DIRECTORY_INFO`.

use std::io::{Cursor, Seek, SeekFrom};

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::binrw_util::{utf16le_bytes, FileTime, SizedWideString};
use crate::create::FileAttributes;
use crate::directory::SearchAttributes;
use crate::error::SmbMsgError;

/// Information level `SMB_FIND_FILE_BOTH_DIRECTORY_INFO`.
pub const FIND_FILE_BOTH_DIRECTORY_INFO: u16 = 0x0104;

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct FindFlags {
    pub close_after_request: bool,
    pub close_at_eos: bool,
    pub return_resume_keys: bool,
    pub continue_from_last: bool,
    pub with_backup_intent: bool,
    #[skip]
    __: B11,
}

/// FIND_FIRST2 parameter block.
#[derive(Debug)]
pub struct FindFirst2Params {
    pub search_attributes: SearchAttributes,
    pub search_count: u16,
    pub flags: FindFlags,
    pub information_level: u16,
    /// `path\*` search pattern, UTF-16LE NUL-terminated on the wire.
    pub pattern: String,
}

impl FindFirst2Params {
    pub fn new(pattern: &str, search_count: u16) -> Self {
        Self {
            search_attributes: SearchAttributes::any_entry(),
            search_count,
            flags: FindFlags::new().with_close_at_eos(true),
            information_level: FIND_FILE_BOTH_DIRECTORY_INFO,
            pattern: pattern.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        self.search_attributes.write_le(&mut cursor)?;
        self.search_count.write_le(&mut cursor)?;
        self.flags.write_le(&mut cursor)?;
        self.information_level.write_le(&mut cursor)?;
        0u32.write_le(&mut cursor)?; // search storage type
        let mut out = cursor.into_inner();
        out.extend_from_slice(&utf16le_bytes(&self.pattern));
        out.extend_from_slice(&[0, 0]);
        Ok(out)
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FindFirst2ResponseParams {
    pub sid: u16,
    pub search_count: u16,
    pub end_of_search: u16,
    pub ea_error_offset: u16,
    pub last_name_offset: u16,
}

impl FindFirst2ResponseParams {
    pub fn parse(parameters: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(parameters);
        Ok(Self::read(&mut cursor)?)
    }
}

/// FIND_NEXT2 parameter block. Resumption is by file name (the resume key
/// is zero and `continue_from_last` is set).
#[derive(Debug)]
pub struct FindNext2Params {
    pub sid: u16,
    pub search_count: u16,
    pub information_level: u16,
    pub flags: FindFlags,
    pub resume_from: String,
}

impl FindNext2Params {
    pub fn new(sid: u16, search_count: u16, resume_from: &str) -> Self {
        Self {
            sid,
            search_count,
            information_level: FIND_FILE_BOTH_DIRECTORY_INFO,
            flags: FindFlags::new()
                .with_close_at_eos(true)
                .with_continue_from_last(true),
            resume_from: resume_from.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut cursor = Cursor::new(Vec::new());
        self.sid.write_le(&mut cursor)?;
        self.search_count.write_le(&mut cursor)?;
        self.information_level.write_le(&mut cursor)?;
        0u32.write_le(&mut cursor)?; // resume key
        self.flags.write_le(&mut cursor)?;
        let mut out = cursor.into_inner();
        out.extend_from_slice(&utf16le_bytes(&self.resume_from));
        out.extend_from_slice(&[0, 0]);
        Ok(out)
    }
}

#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FindNext2ResponseParams {
    pub search_count: u16,
    pub end_of_search: u16,
    pub ea_error_offset: u16,
    pub last_name_offset: u16,
}

impl FindNext2ResponseParams {
    pub fn parse(parameters: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(parameters);
        Ok(Self::read(&mut cursor)?)
    }
}

/// One `SMB_FIND_FILE_BOTH_DIRECTORY_INFO` entry.
#[derive(BinRead, Debug)]
#[br(little)]
pub struct BothDirectoryInfo {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub short_name_length: u8,
    pub reserved: u8,
    pub short_name: [u8; 24],
    #[br(args(file_name_length as u64))]
    pub file_name: SizedWideString,
}

impl BothDirectoryInfo {
    pub fn name(&self) -> Result<String, SmbMsgError> {
        Ok(String::try_from(&self.file_name)?)
    }
}

/// Walks a FIND response data block, following each entry's
/// `next_entry_offset`. `count` comes from the response parameters.
pub fn parse_both_directory_entries(
    data: &[u8],
    count: usize,
) -> Result<Vec<BothDirectoryInfo>, SmbMsgError> {
    let mut entries = Vec::with_capacity(count);
    let mut cursor = Cursor::new(data);
    let mut entry_start = 0u64;
    for index in 0..count {
        let entry = BothDirectoryInfo::read(&mut cursor)?;
        let next = entry.next_entry_offset as u64;
        entries.push(entry);
        if next == 0 {
            if index + 1 != count {
                return Err(SmbMsgError::Malformed(format!(
                    "find data ended after {} of {count} entries",
                    index + 1
                )));
            }
            break;
        }
        entry_start += next;
        cursor.seek(SeekFrom::Start(entry_start))?;
    }
    Ok(entries)
}
