//! This module contains the decoded value types for regulator readings.

use modular_bitfield::prelude::*;
use strum_macros::Display;

/// Charging-algorithm phase, from the two low bits of the state register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RegulatorState {
    Boost,
    Equalize,
    Absorption,
    Float,
}

impl RegulatorState {
    /// Decode the raw state register; bits above the low two are ignored.
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x03 {
            0 => RegulatorState::Boost,
            1 => RegulatorState::Equalize,
            2 => RegulatorState::Absorption,
            _ => RegulatorState::Float,
        }
    }
}

/// Time of day as the regulator keeps it.
///
/// The PL packs the hour and the tens of minutes into one register as
/// `hour * 10 + minute / 6`, with the minute remainder and the seconds in two
/// more; decoding undoes that split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    /// Decode the three raw time registers.
    pub fn from_raw(hour_code: u8, minute_remainder: u8, second: u8) -> Self {
        TimeOfDay {
            hour: hour_code / 10,
            minute: (hour_code % 10) * 6 + minute_remainder,
            second,
        }
    }
}

impl core::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// External current-sense range flags (one byte).
///
/// A set bit means the matching shunt reading is already full scale and is
/// divided by 1 instead of 10.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct ExternalSense {
    pub charge_full_scale: bool,
    pub load_full_scale: bool,
    #[skip]
    __: B6,
}
