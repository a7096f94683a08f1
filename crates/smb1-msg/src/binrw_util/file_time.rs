//! FILETIME handling, per [MS-DTYP] 2.3.3: 100-nanosecond intervals since
//! 1601-01-01 UTC, as a 64-bit little-endian value.

use std::fmt::Display;
use std::ops::Deref;

use binrw::prelude::*;
use time::PrimitiveDateTime;
use time::macros::datetime;

#[derive(BinRead, BinWrite, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FileTime {
    ticks: u64,
}

impl FileTime {
    const EPOCH: PrimitiveDateTime = datetime!(1601-01-01 00:00:00);
    const NANOS_PER_TICK: u64 = 100;

    pub fn date_time(&self) -> PrimitiveDateTime {
        Self::EPOCH + core::time::Duration::from_nanos(self.ticks * Self::NANOS_PER_TICK)
    }

    /// Raw tick count, for callers that keep timestamps opaque.
    pub fn raw(&self) -> u64 {
        self.ticks
    }
}

impl Display for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.date_time().fmt(f)
    }
}

impl std::fmt::Debug for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FileTime").field(&self.date_time()).finish()
    }
}

impl From<u64> for FileTime {
    fn from(ticks: u64) -> Self {
        Self { ticks }
    }
}

impl From<PrimitiveDateTime> for FileTime {
    fn from(dt: PrimitiveDateTime) -> Self {
        Self {
            ticks: (dt - Self::EPOCH).whole_nanoseconds() as u64 / Self::NANOS_PER_TICK,
        }
    }
}

impl Deref for FileTime {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.ticks
    }
}
