//! Simulation time with femtosecond resolution and delta cycles.
//!
//! [`SimTime`] orders events first by femtosecond timestamp, then by delta
//! cycle index. The external interface additionally sees the timestamp as
//! two 32-bit words, so [`SimTime::high`], [`SimTime::low`], and
//! [`SimTime::from_words`] convert between the forms.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;

/// A simulation time point: femtosecond timestamp plus delta cycle index.
///
/// Delta cycles are zero-time evaluation rounds used to resolve signal
/// updates without advancing the clock. Time is monotonically non-decreasing
/// across a run, and the delta index resets to 0 whenever the timestamp
/// advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Timestamp in femtoseconds.
    pub fs: u64,
    /// Delta cycle index within the current time step.
    pub delta: u32,
}

impl SimTime {
    /// Time zero, delta zero.
    pub fn zero() -> Self {
        Self { fs: 0, delta: 0 }
    }

    /// Creates a time from femtoseconds with delta 0.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// Creates a time from nanoseconds with delta 0.
    pub fn from_ns(ns: u64) -> Self {
        Self {
            fs: ns * FS_PER_NS,
            delta: 0,
        }
    }

    /// Reassembles a time from its two 32-bit words, delta 0.
    pub fn from_words(high: u32, low: u32) -> Self {
        Self {
            fs: (u64::from(high) << 32) | u64::from(low),
            delta: 0,
        }
    }

    /// The high 32 bits of the femtosecond timestamp.
    pub fn high(&self) -> u32 {
        (self.fs >> 32) as u32
    }

    /// The low 32 bits of the femtosecond timestamp.
    pub fn low(&self) -> u32 {
        self.fs as u32
    }

    /// The next delta cycle at the same timestamp.
    pub fn next_delta(&self) -> Self {
        Self {
            fs: self.fs,
            delta: self.delta + 1,
        }
    }

    /// Advances to a later timestamp, resetting the delta index.
    pub fn advance_to(&self, new_fs: u64) -> Self {
        debug_assert!(
            new_fs >= self.fs,
            "cannot advance backwards: {} -> {}",
            self.fs,
            new_fs
        );
        Self {
            fs: new_fs,
            delta: 0,
        }
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        if fs == 0 {
            write!(f, "0 fs")?;
        } else if fs >= FS_PER_MS && fs % FS_PER_MS == 0 {
            write!(f, "{} ms", fs / FS_PER_MS)?;
        } else if fs >= FS_PER_US && fs % FS_PER_US == 0 {
            write!(f, "{} us", fs / FS_PER_US)?;
        } else if fs >= FS_PER_NS && fs % FS_PER_NS == 0 {
            write!(f, "{} ns", fs / FS_PER_NS)?;
        } else if fs >= FS_PER_PS && fs % FS_PER_PS == 0 {
            write!(f, "{} ps", fs / FS_PER_PS)?;
        } else {
            write!(f, "{fs} fs")?;
        }
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_time() {
        let t = SimTime::zero();
        assert_eq!(t.fs, 0);
        assert_eq!(t.delta, 0);
        assert_eq!(SimTime::default(), t);
    }

    #[test]
    fn from_ns() {
        let t = SimTime::from_ns(5);
        assert_eq!(t.fs, 5_000_000);
        assert_eq!(t.delta, 0);
    }

    #[test]
    fn word_split() {
        let t = SimTime::from_fs(0x1_2345_6789);
        assert_eq!(t.high(), 1);
        assert_eq!(t.low(), 0x2345_6789);
        assert_eq!(SimTime::from_words(t.high(), t.low()), t);
    }

    #[test]
    fn word_split_small_value() {
        let t = SimTime::from_ns(5);
        assert_eq!(t.high(), 0);
        assert_eq!(t.low(), 5_000_000);
    }

    #[test]
    fn next_delta_keeps_timestamp() {
        let t = SimTime::from_ns(3);
        let d1 = t.next_delta();
        assert_eq!(d1.fs, t.fs);
        assert_eq!(d1.delta, 1);
        assert_eq!(d1.next_delta().delta, 2);
    }

    #[test]
    fn advance_resets_delta() {
        let t = SimTime { fs: 10, delta: 7 };
        let t2 = t.advance_to(20);
        assert_eq!(t2.fs, 20);
        assert_eq!(t2.delta, 0);
    }

    #[test]
    fn ordering() {
        assert!(SimTime::from_ns(1) < SimTime::from_ns(2));
        assert!(SimTime { fs: 100, delta: 0 } < SimTime { fs: 100, delta: 1 });
        assert!(SimTime { fs: 200, delta: 0 } > SimTime { fs: 100, delta: 99 });
    }

    #[test]
    fn display() {
        assert_eq!(SimTime::zero().to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_fs(1_500).to_string(), "1500 fs");
        assert_eq!(SimTime::from_fs(2 * FS_PER_US).to_string(), "2 us");
        let t = SimTime {
            fs: FS_PER_NS,
            delta: 3,
        };
        assert_eq!(t.to_string(), "1 ns+d3");
    }

    #[test]
    fn serde_roundtrip() {
        let t = SimTime {
            fs: 12_345,
            delta: 2,
        };
        let json = serde_json::to_string(&t).unwrap();
        let back: SimTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
