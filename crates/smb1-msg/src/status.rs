//! NT status codes returned by the server.
//!
//! The client always negotiates `flags2.nt_status`, so the 32-bit status in
//! the header is an NTSTATUS, never a DOS error class/code pair.

/// Well-known NT status values this client cares about.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum Status {
    Success = 0x00000000,
    BufferOverflow = 0x80000005,
    NoMoreFiles = 0x80000006,
    InvalidHandle = 0xC0000008,
    InvalidParameter = 0xC000000D,
    NoSuchFile = 0xC000000F,
    EndOfFile = 0xC0000011,
    MoreProcessingRequired = 0xC0000016,
    AccessDenied = 0xC0000022,
    ObjectNameInvalid = 0xC0000033,
    ObjectNameNotFound = 0xC0000034,
    ObjectNameCollision = 0xC0000035,
    ObjectPathNotFound = 0xC000003A,
    SharingViolation = 0xC0000043,
    DeletePending = 0xC0000056,
    DiskFull = 0xC000007F,
    FileIsADirectory = 0xC00000BA,
    NotSupported = 0xC00000BB,
    DirectoryNotEmpty = 0xC0000101,
    NotADirectory = 0xC0000103,
    CannotDelete = 0xC0000121,
}

impl Status {
    pub const U32_SUCCESS: u32 = Status::Success as u32;
    pub const U32_NO_MORE_FILES: u32 = Status::NoMoreFiles as u32;

    /// Whether the code signals an error (severity bits `11`).
    pub fn is_error(value: u32) -> bool {
        value >> 30 == 0b11
    }

    /// Formats a raw status for display, naming it when it is known.
    pub fn try_display_as_status(value: u32) -> String {
        match Status::try_from(value) {
            Ok(status) => format!("{status} ({value:#010x})"),
            Err(()) => format!("{value:#010x}"),
        }
    }
}

impl TryFrom<u32> for Status {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, ()> {
        use Status::*;
        Ok(match value {
            0x00000000 => Success,
            0x80000005 => BufferOverflow,
            0x80000006 => NoMoreFiles,
            0xC0000008 => InvalidHandle,
            0xC000000D => InvalidParameter,
            0xC000000F => NoSuchFile,
            0xC0000011 => EndOfFile,
            0xC0000016 => MoreProcessingRequired,
            0xC0000022 => AccessDenied,
            0xC0000033 => ObjectNameInvalid,
            0xC0000034 => ObjectNameNotFound,
            0xC0000035 => ObjectNameCollision,
            0xC000003A => ObjectPathNotFound,
            0xC0000043 => SharingViolation,
            0xC0000056 => DeletePending,
            0xC000007F => DiskFull,
            0xC00000BA => FileIsADirectory,
            0xC00000BB => NotSupported,
            0xC0000101 => DirectoryNotEmpty,
            0xC0000103 => NotADirectory,
            0xC0000121 => CannotDelete,
            _ => return Err(()),
        })
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "STATUS_SUCCESS",
            Status::BufferOverflow => "STATUS_BUFFER_OVERFLOW",
            Status::NoMoreFiles => "STATUS_NO_MORE_FILES",
            Status::InvalidHandle => "STATUS_INVALID_HANDLE",
            Status::InvalidParameter => "STATUS_INVALID_PARAMETER",
            Status::NoSuchFile => "STATUS_NO_SUCH_FILE",
            Status::EndOfFile => "STATUS_END_OF_FILE",
            Status::MoreProcessingRequired => "STATUS_MORE_PROCESSING_REQUIRED",
            Status::AccessDenied => "STATUS_ACCESS_DENIED",
            Status::ObjectNameInvalid => "STATUS_OBJECT_NAME_INVALID",
            Status::ObjectNameNotFound => "STATUS_OBJECT_NAME_NOT_FOUND",
            Status::ObjectNameCollision => "STATUS_OBJECT_NAME_COLLISION",
            Status::ObjectPathNotFound => "STATUS_OBJECT_PATH_NOT_FOUND",
            Status::SharingViolation => "STATUS_SHARING_VIOLATION",
            Status::DeletePending => "STATUS_DELETE_PENDING",
            Status::DiskFull => "STATUS_DISK_FULL",
            Status::FileIsADirectory => "STATUS_FILE_IS_A_DIRECTORY",
            Status::NotSupported => "STATUS_NOT_SUPPORTED",
            Status::DirectoryNotEmpty => "STATUS_DIRECTORY_NOT_EMPTY",
            Status::NotADirectory => "STATUS_NOT_A_DIRECTORY",
            Status::CannotDelete => "STATUS_CANNOT_DELETE",
        };
        write!(f, "{name}")
    }
}
