// src/types.rs
use crate::error::{PdwError, Result};
use std::fmt;

/// Position of a descriptor within a PDW stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Chained to the previous descriptor
    Continue = 0,
    /// First descriptor of a stream
    First = 1,
    /// Last descriptor of a stream
    Last = 2,
}

impl Operation {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Operation::Continue),
            1 => Some(Operation::First),
            2 => Some(Operation::Last),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Continue => "continue",
            Operation::First => "first",
            Operation::Last => "last",
        }
    }
}

/// Phase behaviour at the start of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhaseMode {
    /// Phase is set to the descriptor's absolute value
    #[default]
    Coherent,
    /// Phase continues from the previous descriptor
    Continuous,
}

/// RF output state while a descriptor plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RfState {
    #[default]
    On,
    Off,
}

/// Selection of the instrument's auxiliary trigger markers (markers 1..=12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MarkerMask(u16);

impl MarkerMask {
    pub const COUNT: u8 = 12;
    const VALID_BITS: u16 = 0x0FFF;

    pub const fn empty() -> Self {
        MarkerMask(0)
    }

    /// Returns `None` if any bit above marker 12 is set
    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits & !Self::VALID_BITS != 0 {
            return None;
        }
        Some(MarkerMask(bits))
    }

    /// Mask with only `marker` (1-based) selected
    pub fn marker(marker: u8) -> Option<Self> {
        Self::empty().with(marker)
    }

    pub fn with(self, marker: u8) -> Option<Self> {
        if marker == 0 || marker > Self::COUNT {
            return None;
        }
        Some(MarkerMask(self.0 | 1 << (marker - 1)))
    }

    pub fn contains(&self, marker: u8) -> bool {
        marker >= 1 && marker <= Self::COUNT && self.0 & (1 << (marker - 1)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

/// Selection of the markers embedded in the played waveform (markers 1..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WfmMarkerMask(u8);

impl WfmMarkerMask {
    pub const COUNT: u8 = 4;
    const VALID_BITS: u8 = 0x0F;

    pub const fn empty() -> Self {
        WfmMarkerMask(0)
    }

    pub const fn all() -> Self {
        WfmMarkerMask(Self::VALID_BITS)
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::VALID_BITS != 0 {
            return None;
        }
        Some(WfmMarkerMask(bits))
    }

    pub fn with(self, marker: u8) -> Option<Self> {
        if marker == 0 || marker > Self::COUNT {
            return None;
        }
        Some(WfmMarkerMask(self.0 | 1 << (marker - 1)))
    }

    pub fn contains(&self, marker: u8) -> bool {
        marker >= 1 && marker <= Self::COUNT && self.0 & (1 << (marker - 1)) != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Time since stream start as unsigned fixed point, 1 LSB = 1 ps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOffset(u64);

impl TimeOffset {
    pub const ZERO: TimeOffset = TimeOffset(0);
    pub const PICOS_PER_SECOND: u64 = 1_000_000_000_000;

    pub const fn from_picos(picos: u64) -> Self {
        TimeOffset(picos)
    }

    pub fn from_nanos(nanos: u64) -> Result<Self> {
        Self::scaled(nanos, 1_000, "ns")
    }

    pub fn from_micros(micros: u64) -> Result<Self> {
        Self::scaled(micros, 1_000_000, "us")
    }

    fn scaled(value: u64, picos_per_unit: u64, unit: &str) -> Result<Self> {
        value.checked_mul(picos_per_unit).map(TimeOffset).ok_or_else(|| {
            PdwError::InvalidParameter(format!(
                "time offset {} {} does not fit the 64-bit picosecond field",
                value, unit
            ))
        })
    }

    /// Convert from seconds, rounding to the nearest picosecond
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(PdwError::InvalidParameter(format!(
                "time offset must be a finite, non-negative number of seconds, got {}",
                secs
            )));
        }

        let picos = (secs * Self::PICOS_PER_SECOND as f64).round();
        if picos >= u64::MAX as f64 {
            return Err(PdwError::InvalidParameter(format!(
                "time offset {} s does not fit the 64-bit picosecond field",
                secs
            )));
        }

        Ok(TimeOffset(picos as u64))
    }

    pub fn as_picos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / Self::PICOS_PER_SECOND as f64
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / Self::PICOS_PER_SECOND;
        let frac = self.0 % Self::PICOS_PER_SECOND;
        write!(f, "{}.{:012} s", secs, frac)
    }
}
