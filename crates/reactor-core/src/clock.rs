//! Monotonic clock and tick unit.
//!
//! Ticks are 1/16384 of a second. The denominator is a power of two so that
//! bucket selection in the timer wheel is a bitmask rather than a division.

use std::time::{SystemTime, UNIX_EPOCH};

pub type Tick = u64;

pub const TICKS_PER_SECOND: u64 = 1 << 14;
pub const TICKS_FROM_SECONDS: u64 = TICKS_PER_SECOND;
pub const TICKS_FROM_MICROSECONDS: u64 = TICKS_PER_SECOND;

/// Converts a `(seconds, microseconds)` pair into ticks.
#[inline]
pub const fn ticks_from(secs: u64, micros: u64) -> Tick {
    secs * TICKS_FROM_SECONDS + micros / TICKS_FROM_MICROSECONDS
}

/// Current wall-clock time expressed in ticks.
#[inline]
pub fn now_ticks() -> Tick {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    ticks_from(now.as_secs(), u64::from(now.subsec_micros()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_from_zero() {
        assert_eq!(ticks_from(0, 0), 0);
    }

    #[test]
    fn ticks_from_one_second() {
        assert_eq!(ticks_from(1, 0), TICKS_PER_SECOND);
    }

    #[test]
    fn ticks_from_microseconds_truncates() {
        // 16383 micros is less than one tick (16384us), so it rounds down to 0.
        assert_eq!(ticks_from(0, 16_383), 0);
        assert_eq!(ticks_from(0, 16_384), 1);
    }

    #[test]
    fn now_ticks_is_monotonic_enough() {
        let a = now_ticks();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = now_ticks();
        assert!(b >= a);
    }
}
