//! UTF-16LE string helpers for SMB1 data blocks.

use std::io::{Read, Seek, Write};
use std::string::FromUtf16Error;

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// Encodes a string as UTF-16LE bytes, without a terminator.
pub fn utf16le_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// A wide string whose length (in bytes) is carried in a separate field.
///
/// Reads take the byte length as an argument; writes emit the code units with
/// no terminator. Used by FIND response entries, where each file name is
/// delimited by the entry's `file_name_length` field.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SizedWideString {
    units: Vec<u16>,
}

impl SizedWideString {
    /// Size of the string's data, in bytes.
    pub fn size(&self) -> u64 {
        self.units.len() as u64 * 2
    }
}

impl BinRead for SizedWideString {
    type Args<'a> = (u64,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        (size_bytes,): Self::Args<'_>,
    ) -> BinResult<Self> {
        if size_bytes % 2 != 0 {
            return Err(binrw::Error::AssertFail {
                pos: reader.stream_position()?,
                message: format!("wide string length {size_bytes} is not a multiple of 2"),
            });
        }
        let mut units = Vec::with_capacity((size_bytes / 2) as usize);
        for _ in 0..size_bytes / 2 {
            units.push(u16::read_options(reader, endian, ())?);
        }
        Ok(Self { units })
    }
}

impl BinWrite for SizedWideString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.units.write_options(writer, endian, ())
    }
}

impl From<&str> for SizedWideString {
    fn from(s: &str) -> Self {
        Self {
            units: s.encode_utf16().collect(),
        }
    }
}

impl TryFrom<&SizedWideString> for String {
    type Error = FromUtf16Error;

    fn try_from(value: &SizedWideString) -> Result<Self, Self::Error> {
        String::from_utf16(&value.units)
    }
}

impl std::fmt::Debug for SizedWideString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", String::from_utf16_lossy(&self.units))
    }
}

/// A path in a `BufferFormat`-tagged data block, with the alignment pad the
/// microSD Management server insists on.
///
/// Layout: a `0x04` type tag, then a single `0x00` pad whenever the next
/// byte would land on an odd offset within the data block, then the UTF-16LE
/// path, then a UTF-16 NUL. The server aligns relative to the start of the
/// data block (not the SMB header), so the pad is required even though a
/// conformant server would reject it; omitting it yields
/// `STATUS_OBJECT_NAME_INVALID`.
///
/// Write-only: the serializer must be positioned inside a stream that starts
/// at the beginning of the data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFormatPath {
    path: String,
}

impl BufferFormatPath {
    const BUFFER_FORMAT: u8 = 0x04;

    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl BinWrite for BufferFormatPath {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        Self::BUFFER_FORMAT.write_options(writer, endian, ())?;
        if writer.stream_position()? % 2 != 0 {
            0u8.write_options(writer, endian, ())?;
        }
        for unit in self.path.encode_utf16() {
            unit.write_options(writer, endian, ())?;
        }
        0u16.write_options(writer, endian, ())
    }
}
