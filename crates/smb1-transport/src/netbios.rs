//! NBSS frame header and NetBIOS name encoding (RFC 1001/1002).

use binrw::prelude::*;

use crate::TransportError;

/// Service suffix for the file server name (the *called* name).
pub const FILE_SERVER_SUFFIX: u8 = 0x20;
/// Service suffix for a workstation (the *calling* name).
pub const WORKSTATION_SUFFIX: u8 = 0x00;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum NbssFrameType {
    SessionMessage = 0x00,
    SessionRequest = 0x81,
    PositiveSessionResponse = 0x82,
    NegativeSessionResponse = 0x83,
    SessionRetargetResponse = 0x84,
    SessionKeepAlive = 0x85,
}

/// The 4-byte NBSS frame header. Bit 0 of the flags byte extends the
/// big-endian length field to 17 bits.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(big)]
pub struct NbssFrameHeader {
    pub frame_type: NbssFrameType,
    flags: u8,
    length_low: u16,
}

impl NbssFrameHeader {
    pub const SIZE: usize = 4;
    const LENGTH_EXTENSION: u8 = 0x01;
    const MAX_PAYLOAD: usize = 0x1FFFF;

    pub fn new(frame_type: NbssFrameType, payload_length: usize) -> Result<Self, TransportError> {
        if payload_length > Self::MAX_PAYLOAD {
            return Err(TransportError::FrameTooLarge(payload_length));
        }
        Ok(Self {
            frame_type,
            flags: ((payload_length >> 16) as u8) & Self::LENGTH_EXTENSION,
            length_low: payload_length as u16,
        })
    }

    pub fn payload_length(&self) -> usize {
        (((self.flags & Self::LENGTH_EXTENSION) as usize) << 16) | self.length_low as usize
    }
}

/// A NetBIOS name: up to 15 ASCII characters plus a one-byte service
/// suffix, space-padded to 16 bytes and first-level encoded on the wire
/// (each byte split into two nibbles offset from `'A'`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NetBiosName {
    name: String,
    suffix: u8,
}

impl NetBiosName {
    const NAME_BYTES: usize = 15;
    const ENCODED_BYTES: usize = 34;
    const NIBBLE_BASE: u8 = b'A';

    pub fn new(name: &str, suffix: u8) -> Result<Self, TransportError> {
        if name.is_empty() || name.len() > Self::NAME_BYTES {
            return Err(TransportError::InvalidName(format!(
                "name must be 1-{} characters, got {:?}",
                Self::NAME_BYTES,
                name
            )));
        }
        if !name.is_ascii() {
            return Err(TransportError::InvalidName(format!(
                "name must be ASCII, got {name:?}"
            )));
        }
        Ok(Self {
            name: name.to_ascii_uppercase(),
            suffix,
        })
    }

    /// The server's file service name.
    pub fn file_server(name: &str) -> Result<Self, TransportError> {
        Self::new(name, FILE_SERVER_SUFFIX)
    }

    /// This client's own calling name.
    pub fn workstation(name: &str) -> Result<Self, TransportError> {
        Self::new(name, WORKSTATION_SUFFIX)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> u8 {
        self.suffix
    }

    /// Space-padded 16-byte form: 15 name bytes plus the suffix.
    fn padded(&self) -> [u8; 16] {
        let mut out = [b' '; 16];
        out[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out[15] = self.suffix;
        out
    }

    /// First-level encoding: length byte, 32 nibble characters, NUL label.
    pub fn encode(&self) -> [u8; Self::ENCODED_BYTES] {
        let mut out = [0u8; Self::ENCODED_BYTES];
        out[0] = 0x20;
        for (i, byte) in self.padded().into_iter().enumerate() {
            out[1 + 2 * i] = (byte >> 4) + Self::NIBBLE_BASE;
            out[2 + 2 * i] = (byte & 0x0F) + Self::NIBBLE_BASE;
        }
        out
    }

    /// Decodes a first-level encoded name.
    pub fn decode(encoded: &[u8; Self::ENCODED_BYTES]) -> Result<Self, TransportError> {
        if encoded[0] != 0x20 || encoded[33] != 0x00 {
            return Err(TransportError::InvalidName(
                "bad first-level encoding framing".into(),
            ));
        }
        let mut padded = [0u8; 16];
        for (i, slot) in padded.iter_mut().enumerate() {
            let high = encoded[1 + 2 * i].wrapping_sub(Self::NIBBLE_BASE);
            let low = encoded[2 + 2 * i].wrapping_sub(Self::NIBBLE_BASE);
            if high > 0x0F || low > 0x0F {
                return Err(TransportError::InvalidName(
                    "nibble character out of range".into(),
                ));
            }
            *slot = (high << 4) | low;
        }
        let suffix = padded[15];
        let name = std::str::from_utf8(&padded[..15])
            .map_err(|_| TransportError::InvalidName("non-ASCII decoded name".into()))?
            .trim_end_matches(' ')
            .to_string();
        Self::new(&name, suffix)
    }
}

impl std::fmt::Display for NetBiosName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{:02X}>", self.name, self.suffix)
    }
}

impl BinWrite for NetBiosName {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.encode().write_options(writer, endian, ())
    }
}

impl BinRead for NetBiosName {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let encoded = <[u8; Self::ENCODED_BYTES]>::read_options(reader, endian, ())?;
        Self::decode(&encoded).map_err(|e| binrw::Error::AssertFail {
            pos,
            message: e.to_string(),
        })
    }
}

/// SESSION_REQUEST payload: the called (server) then calling (client) name.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SessionRequest {
    pub called_name: NetBiosName,
    pub calling_name: NetBiosName,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_header_roundtrip() {
        let header = NbssFrameHeader::new(NbssFrameType::SessionMessage, 0x1ABCD).unwrap();
        assert_eq!(header.payload_length(), 0x1ABCD);

        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes, [0x00, 0x01, 0xAB, 0xCD]);

        let parsed = NbssFrameHeader::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn frame_header_rejects_oversize() {
        assert!(matches!(
            NbssFrameHeader::new(NbssFrameType::SessionMessage, 0x20000),
            Err(TransportError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn name_encodes_first_level() {
        // 'S' = 0x53 -> "FD", space = 0x20 -> "CA", suffix 0x20 -> "CA".
        let name = NetBiosName::file_server("S").unwrap();
        let encoded = name.encode();
        assert_eq!(encoded[0], 0x20);
        assert_eq!(&encoded[1..3], b"FD");
        assert_eq!(&encoded[3..5], b"CA");
        assert_eq!(&encoded[31..33], b"CA");
        assert_eq!(encoded[33], 0x00);
    }

    #[test]
    fn name_roundtrips() {
        let name = NetBiosName::new("3DS-ABCD", 0x20).unwrap();
        let decoded = NetBiosName::decode(&name.encode()).unwrap();
        assert_eq!(decoded, name);
        assert_eq!(decoded.to_string(), "3DS-ABCD<20>");
    }

    #[test]
    fn name_uppercases_and_validates() {
        let name = NetBiosName::workstation("sdmc-rs").unwrap();
        assert_eq!(name.name(), "SDMC-RS");
        assert!(NetBiosName::workstation("").is_err());
        assert!(NetBiosName::workstation("0123456789ABCDEF").is_err());
        assert!(NetBiosName::workstation("ÜBER").is_err());
    }

    #[test]
    fn session_request_is_68_bytes() {
        let request = SessionRequest {
            called_name: NetBiosName::file_server("3DS-ABCD").unwrap(),
            calling_name: NetBiosName::workstation("SDMC-RS").unwrap(),
        };
        let mut cursor = Cursor::new(Vec::new());
        request.write_le(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), 68);
    }
}
