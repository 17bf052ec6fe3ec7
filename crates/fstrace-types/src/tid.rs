use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::compact_hex;
use crate::error::TypeError;

const NANOS_PER_MINUTE: u128 = 60_000_000_000;
const FRACTION_SCALE: u128 = 1 << 32;

/// Transaction identifier.
///
/// A `Tid` is both a unique, monotonically increasing transaction id and a
/// packed wall-clock timestamp:
///
/// - high 32 bits: minutes since 1900-01-01 00:00 in the mixed radix
///   `((((year - 1900) * 12 + month - 1) * 31 + day - 1) * 24 + hour) * 60 + minute`
/// - low 32 bits: the position within that minute, scaled so that `2^32`
///   is one full minute
///
/// The radix uses 31-day months, so not every `Tid` decodes to a real
/// calendar date. Decoding is for display only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Tid(u64);

impl Tid {
    /// The zero tid, earlier than any real transaction.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw integer.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The 8-byte big-endian form used on disk.
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode the packed wall-clock fields.
    pub fn timestamp(self) -> TimeStamp {
        let mut packed = self.0 >> 32;
        let minute = (packed % 60) as u32;
        packed /= 60;
        let hour = (packed % 24) as u32;
        packed /= 24;
        let day = (packed % 31) as u32 + 1;
        packed /= 31;
        let month = (packed % 12) as u32 + 1;
        packed /= 12;
        let year = packed as u32 + 1900;

        let fraction = self.0 & 0xffff_ffff;
        let nanos_in_minute = (fraction as u128 * NANOS_PER_MINUTE / FRACTION_SCALE) as u64;

        TimeStamp {
            year,
            month,
            day,
            hour,
            minute,
            nanos_in_minute,
        }
    }

    /// Convert to a calendar date-time, if the packed fields form a real date.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        self.timestamp().to_datetime()
    }

    /// Encode a calendar date-time (UTC) as a tid.
    pub fn from_datetime(dt: NaiveDateTime) -> Result<Self, TypeError> {
        let year = u64::try_from(dt.year() - 1900)
            .map_err(|_| TypeError::TimestampOutOfRange(format!("{dt} is before 1900")))?;

        let minutes = ((((year * 12 + u64::from(dt.month0())) * 31 + u64::from(dt.day0())) * 24
            + u64::from(dt.hour()))
            * 60)
            + u64::from(dt.minute());
        let high = u32::try_from(minutes)
            .map_err(|_| TypeError::TimestampOutOfRange(format!("{dt} is too far in the future")))?;

        // Leap seconds report nanosecond values past 1e9; clamp into the minute.
        let nanos = u128::from(dt.second()) * 1_000_000_000 + u128::from(dt.nanosecond());
        let nanos = nanos.min(NANOS_PER_MINUTE - 1);
        let low = (nanos * FRACTION_SCALE / NANOS_PER_MINUTE) as u64;

        Ok(Self((u64::from(high) << 32) | low))
    }

    /// A tid for the current wall-clock time.
    pub fn now() -> Self {
        // The current date always lies inside the encodable range.
        Self::from_datetime(Utc::now().naive_utc()).unwrap_or(Self::ZERO)
    }

    /// Return `self` if it is strictly after `prev`, otherwise the smallest
    /// tid that is.
    pub fn later_than(self, prev: Tid) -> Tid {
        if self > prev {
            self
        } else {
            Tid(prev.0.saturating_add(1))
        }
    }
}

impl fmt::Debug for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tid({self})")
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", compact_hex(self.0))
    }
}

impl From<u64> for Tid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Wall-clock fields decoded from a [`Tid`].
///
/// Displays as `YYYY-MM-DD HH:MM:SS.ffffff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeStamp {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    /// Nanoseconds elapsed within the minute.
    pub nanos_in_minute: u64,
}

impl TimeStamp {
    /// Seconds within the minute, including the fractional part.
    pub fn seconds(&self) -> f64 {
        self.nanos_in_minute as f64 / 1e9
    }

    /// The equivalent calendar date-time, or `None` for impossible dates
    /// such as February 31st.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let secs = (self.nanos_in_minute / 1_000_000_000) as u32;
        let nanos = (self.nanos_in_minute % 1_000_000_000) as u32;
        NaiveDate::from_ymd_opt(self.year as i32, self.month, self.day)?
            .and_hms_nano_opt(self.hour, self.minute, secs, nanos)
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Nearest microsecond, never rounding up into the next minute.
        let micros = ((self.nanos_in_minute + 500) / 1000).min(59_999_999);
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            micros / 1_000_000,
            micros % 1_000_000
        )
    }
}
