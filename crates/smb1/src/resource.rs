//! Caller-facing resource types and the mapping from semantic access
//! requests to NT_CREATE_ANDX bitmasks.

use smb1_msg::create::{
    CreateDisposition, CreateOptions, DesiredAccess, FileAttributes, NtCreateAndxResponse,
    ShareAccess,
};
use smb1_msg::FileTime;

/// One entry from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    /// Raw `SMB_EXT_FILE_ATTR` bits.
    pub attributes: u32,
    /// Last write time, in FILETIME ticks.
    pub mtime: u64,
}

/// Share capacity, from `SMB_QUERY_FS_SIZE_INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
}

/// An open FID and the create-response metadata that came with it.
/// Valid only within the connection that produced it; the client closes
/// handles best-effort on error paths.
#[derive(Debug, Clone, Copy)]
pub struct FileHandle {
    pub fid: u16,
    pub is_dir: bool,
    pub end_of_file: u64,
    pub attributes: u32,
    pub mtime: FileTime,
}

impl FileHandle {
    pub(crate) fn from_response(response: &NtCreateAndxResponse) -> Self {
        Self {
            fid: response.fid,
            is_dir: response.directory,
            end_of_file: response.end_of_file,
            attributes: u32::from_le_bytes(response.file_attributes.into_bytes()),
            mtime: response.last_write_time,
        }
    }
}

/// Semantic access request, mapped onto `DesiredAccess` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub(crate) fn desired_access(self) -> DesiredAccess {
        let read = DesiredAccess::new()
            .with_read_data(true)
            .with_read_ea(true)
            .with_read_attributes(true);
        match self {
            Access::Read => read,
            Access::Write => DesiredAccess::new()
                .with_write_data(true)
                .with_append_data(true)
                .with_write_attributes(true),
            Access::ReadWrite => read
                .with_write_data(true)
                .with_append_data(true)
                .with_write_attributes(true),
        }
    }
}

/// Semantic open disposition, mapped onto `CreateDisposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fail unless the file exists.
    OpenExisting,
    /// Fail if the file exists.
    CreateNew,
    /// Open, creating if absent.
    OpenIf,
    /// Truncate or create.
    OverwriteIf,
    /// Truncate an existing file.
    Overwrite,
}

impl Disposition {
    pub(crate) fn create_disposition(self) -> CreateDisposition {
        match self {
            Disposition::OpenExisting => CreateDisposition::Open,
            Disposition::CreateNew => CreateDisposition::Create,
            Disposition::OpenIf => CreateDisposition::OpenIf,
            Disposition::OverwriteIf => CreateDisposition::OverwriteIf,
            Disposition::Overwrite => CreateDisposition::Overwrite,
        }
    }
}

/// Share access offered on every open: the server is single-session, but
/// full sharing keeps retries after a dropped connection from tripping
/// sharing violations.
pub(crate) fn default_share_access() -> ShareAccess {
    ShareAccess::new()
        .with_read(true)
        .with_write(true)
        .with_delete(true)
}

pub(crate) fn file_create_options() -> CreateOptions {
    CreateOptions::new().with_non_directory_file(true)
}

pub(crate) fn directory_create_options() -> CreateOptions {
    CreateOptions::new().with_directory_file(true)
}

pub(crate) fn default_file_attributes() -> FileAttributes {
    FileAttributes::new().with_normal(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_access_has_no_write_bits() {
        let access = Access::Read.desired_access();
        assert!(access.read_data());
        assert!(!access.write_data());
    }

    #[test]
    fn read_write_access_has_both() {
        let access = Access::ReadWrite.desired_access();
        assert!(access.read_data());
        assert!(access.write_data());
        assert!(access.append_data());
    }

    #[test]
    fn dispositions_map_to_nt_values() {
        assert_eq!(
            Disposition::OpenExisting.create_disposition(),
            CreateDisposition::Open
        );
        assert_eq!(
            Disposition::OverwriteIf.create_disposition(),
            CreateDisposition::OverwriteIf
        );
    }
}
