//! Simulation clock and minute-of-day conversions.

use serde::{Deserialize, Serialize};
use std::{f64::consts::PI, fmt};

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Simulated minutes covered by one engine tick.
pub const TICK_MINUTES: u32 = 5;

/// Number of ticks in one simulated day.
pub const TICKS_PER_DAY: u32 = MINUTES_PER_DAY / TICK_MINUTES;

const SUNRISE: u32 = 6 * 60;
const SUNSET: u32 = 19 * 60;

/// Point in simulated time: day index plus minute of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime {
    pub day: u32,
    pub minute: u32,
}

impl SimTime {
    pub fn new(day: u32, minute: u32) -> Self {
        Self {
            day: day + minute / MINUTES_PER_DAY,
            minute: minute % MINUTES_PER_DAY,
        }
    }

    /// Advance by `minutes`, returning `true` if a day boundary was crossed.
    pub fn advance(&mut self, minutes: u32) -> bool {
        let total = self.minute + minutes;
        self.day += total / MINUTES_PER_DAY;
        self.minute = total % MINUTES_PER_DAY;
        total >= MINUTES_PER_DAY
    }

    /// Absolute minute since the start of day 0.
    pub fn minute_of_simulation(&self) -> u64 {
        self.day as u64 * MINUTES_PER_DAY as u64 + self.minute as u64
    }

    pub fn clock_label(&self) -> String {
        minutes_to_clock(self.minute)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Day {} {}", self.day + 1, minutes_to_clock(self.minute))
    }
}

/// Format a minute of day as a 12-hour clock label, e.g. `06:05 AM`.
pub fn minutes_to_clock(minute: u32) -> String {
    let minute = minute % MINUTES_PER_DAY;
    let hour = minute / 60;
    let mins = minute % 60;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour:02}:{mins:02} {suffix}")
}

/// Day/night indicator used by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sunlight {
    pub is_day: bool,
    pub sun_altitude: f64,
    pub brightness: f64,
}

/// Compute the sunlight state for a minute of day.
///
/// Daytime runs from sunrise (06:00) to sunset (19:00); the sun arc is a
/// half sine over each span, brighter and positive by day, dim and negative
/// by night.
pub fn sunlight(minute: u32) -> Sunlight {
    let minute = minute % MINUTES_PER_DAY;
    if (SUNRISE..=SUNSET).contains(&minute) {
        let progress = (minute - SUNRISE) as f64 / (SUNSET - SUNRISE) as f64;
        let arc = (progress * PI).sin();
        return Sunlight {
            is_day: true,
            sun_altitude: arc,
            brightness: 0.25 + 0.75 * arc,
        };
    }

    let span = (SUNRISE + (MINUTES_PER_DAY - SUNSET)) as f64;
    let elapsed = if minute < SUNRISE {
        minute + (MINUTES_PER_DAY - SUNSET)
    } else {
        minute - SUNSET
    };
    let arc = (elapsed as f64 / span * PI).sin();
    Sunlight {
        is_day: false,
        sun_altitude: -arc,
        brightness: 0.05 + 0.25 * arc,
    }
}
