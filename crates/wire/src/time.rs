use std::time::Duration;

use crate::EncodeError;

/// Seconds plus microseconds, the resolution every timestamp and RTT in the
/// format is kept at.
///
/// `usec` is expected below one second. Fields written as a pair keep it
/// as given; an RTT is a single microsecond count and is only encodable
/// when normalised and under `u32::MAX` microseconds (about 71 minutes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeval {
    pub sec: u32,
    pub usec: u32,
}

impl Timeval {
    pub const ZERO: Timeval = Timeval { sec: 0, usec: 0 };

    #[must_use]
    pub const fn new(sec: u32, usec: u32) -> Self {
        Timeval { sec, usec }
    }

    /// Splits a microsecond count, as stored by the 4-byte RTT encoding.
    #[must_use]
    pub const fn from_micros(us: u32) -> Self {
        Timeval {
            sec: us / 1_000_000,
            usec: us % 1_000_000,
        }
    }

    /// Microsecond count for the 4-byte RTT encoding.
    ///
    /// # Errors
    ///
    /// [`EncodeError::Inconsistent`] if `usec` is a second or more, and
    /// [`EncodeError::TooLarge`] if the count does not fit 32 bits.
    pub fn rtt_micros(&self) -> Result<u32, EncodeError> {
        if self.usec >= 1_000_000 {
            return Err(EncodeError::Inconsistent("rtt microseconds of a second or more"));
        }
        let us = u64::from(self.sec) * 1_000_000 + u64::from(self.usec);
        u32::try_from(us).map_err(|_| EncodeError::TooLarge {
            what: "rtt microseconds",
            len: us as usize,
            max: u32::MAX as usize,
        })
    }

    /// Hundredths of a second, as used by some wait intervals.
    #[must_use]
    pub const fn from_centis(cs: u32) -> Self {
        Timeval {
            sec: cs / 100,
            usec: (cs % 100) * 10_000,
        }
    }

    /// Whole hundredths of a second; any finer part is dropped. See
    /// [`Timeval::is_centi_aligned`].
    #[must_use]
    pub fn to_centis(&self) -> u64 {
        u64::from(self.sec) * 100 + u64::from(self.usec / 10_000)
    }

    /// Whether [`Timeval::to_centis`] loses nothing.
    #[must_use]
    pub fn is_centi_aligned(&self) -> bool {
        self.usec < 1_000_000 && self.usec % 10_000 == 0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.usec == 0
    }

    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::new(u64::from(self.sec), self.usec.saturating_mul(1000))
    }
}
