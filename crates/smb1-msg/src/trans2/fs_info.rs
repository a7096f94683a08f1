//! TRANS2 QUERY_FS_INFORMATION with `SMB_QUERY_FS_SIZE_INFO`.

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::SmbMsgError;

/// Information level `SMB_QUERY_FS_SIZE_INFO`.
pub const QUERY_FS_SIZE_INFO: u16 = 0x0103;

/// Parameter block: just the requested information level.
pub fn query_fs_size_params() -> Vec<u8> {
    QUERY_FS_SIZE_INFO.to_le_bytes().to_vec()
}

/// `SMB_QUERY_FS_SIZE_INFO` response data.
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct FsSizeInfo {
    pub total_allocation_units: u64,
    pub free_allocation_units: u64,
    pub sectors_per_allocation_unit: u32,
    pub bytes_per_sector: u32,
}

impl FsSizeInfo {
    pub fn parse(data: &[u8]) -> Result<Self, SmbMsgError> {
        let mut cursor = Cursor::new(data);
        Ok(Self::read(&mut cursor)?)
    }

    fn unit_bytes(&self) -> u64 {
        self.sectors_per_allocation_unit as u64 * self.bytes_per_sector as u64
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_allocation_units * self.unit_bytes()
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_allocation_units * self.unit_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_arithmetic() {
        let mut data = Vec::new();
        data.extend_from_slice(&1000u64.to_le_bytes());
        data.extend_from_slice(&250u64.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&512u32.to_le_bytes());

        let info = FsSizeInfo::parse(&data).unwrap();
        assert_eq!(info.total_bytes(), 1000 * 4096);
        assert_eq!(info.free_bytes(), 250 * 4096);
        assert!(info.free_bytes() <= info.total_bytes());
    }
}
