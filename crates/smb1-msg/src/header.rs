//! The fixed 32-byte SMB1 message header.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// SMB1 command codes used by the microSD Management server.
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum Command {
    CreateDirectory = 0x00,
    DeleteDirectory = 0x01,
    Close = 0x04,
    Delete = 0x06,
    Rename = 0x07,
    Echo = 0x2B,
    ReadAndx = 0x2E,
    WriteAndx = 0x2F,
    Transaction2 = 0x32,
    TreeDisconnect = 0x71,
    Negotiate = 0x72,
    SessionSetupAndx = 0x73,
    LogoffAndx = 0x74,
    TreeConnectAndx = 0x75,
    NtCreateAndx = 0xA2,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::CreateDirectory => "Create Directory",
            Command::DeleteDirectory => "Delete Directory",
            Command::Close => "Close",
            Command::Delete => "Delete",
            Command::Rename => "Rename",
            Command::Echo => "Echo",
            Command::ReadAndx => "Read AndX",
            Command::WriteAndx => "Write AndX",
            Command::Transaction2 => "Transaction2",
            Command::TreeDisconnect => "Tree Disconnect",
            Command::Negotiate => "Negotiate",
            Command::SessionSetupAndx => "Session Setup AndX",
            Command::LogoffAndx => "Logoff AndX",
            Command::TreeConnectAndx => "Tree Connect AndX",
            Command::NtCreateAndx => "NT Create AndX",
        };
        write!(f, "{} ({:#04x})", name, *self as u8)
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct HeaderFlags {
    pub lock_and_read_ok: bool,
    pub buf_avail: bool,
    #[skip]
    __: B1,
    pub case_insensitive: bool,
    pub canonicalized_paths: bool,
    pub oplock: bool,
    pub oplock_batch: bool,
    pub reply: bool,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct HeaderFlags2 {
    pub long_names_allowed: bool,
    pub eas: bool,
    pub security_signature: bool,
    pub compressed: bool,
    pub security_signature_required: bool,
    #[skip]
    __: B1,
    pub is_long_name: bool,
    #[skip]
    __: B4,
    pub extended_security: bool,
    pub dfs: bool,
    pub paging_io: bool,
    pub nt_status: bool,
    pub unicode: bool,
}

/// An AndX chaining block. This client never chains, so requests always
/// carry the `0xFF` "no further command" marker; response values are
/// consumed and dropped.
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
pub struct AndX {
    #[bw(calc = 0xFF)]
    _command: u8,
    #[bw(calc = 0)]
    _reserved: u8,
    #[bw(calc = 0)]
    _offset: u16,
}

/// The SMB1 header: `\xFFSMB`, command, NT status, flags, and the
/// TID/PID/UID/MID multiplex tuple.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little, magic(b"\xffSMB"))]
pub struct SmbHeader {
    pub command: Command,
    pub status: u32,
    pub flags: HeaderFlags,
    pub flags2: HeaderFlags2,
    #[bw(calc = 0)]
    #[br(assert(_pid_high == 0))]
    _pid_high: u16,
    #[bw(calc = [0u8; 8])]
    _security_features: [u8; 8],
    #[bw(calc = 0)]
    _reserved: u16,
    pub tid: u16,
    pub pid: u16,
    pub uid: u16,
    pub mid: u16,
}

impl SmbHeader {
    /// Size of the header network structure in bytes, including the magic.
    pub const SIZE: usize = 32;

    /// Request flags used for every message this client sends.
    pub fn request_flags() -> HeaderFlags {
        HeaderFlags::new()
            .with_case_insensitive(true)
            .with_canonicalized_paths(true)
    }

    /// Request flags2: Unicode strings, NT status codes, long names, and
    /// extended security for the SPNEGO session setup.
    pub fn request_flags2() -> HeaderFlags2 {
        HeaderFlags2::new()
            .with_long_names_allowed(true)
            .with_is_long_name(true)
            .with_extended_security(true)
            .with_nt_status(true)
            .with_unicode(true)
    }
}
