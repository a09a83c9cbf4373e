use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Day of week as stored and served: 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl DayOfWeek {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(DayOfWeek::Sunday),
            1 => Some(DayOfWeek::Monday),
            2 => Some(DayOfWeek::Tuesday),
            3 => Some(DayOfWeek::Wednesday),
            4 => Some(DayOfWeek::Thursday),
            5 => Some(DayOfWeek::Friday),
            6 => Some(DayOfWeek::Saturday),
            _ => None,
        }
    }

    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DayOfWeek::from_index(value as i64)
            .ok_or_else(|| format!("day_of_week must be 0 (Sunday) through 6 (Saturday), got {value}"))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> u8 {
        day as u8
    }
}

/// Wall-clock time of day as minutes since local midnight.
///
/// Valid range is 0..=1440; 1440 ("24:00") is only meaningful as the
/// exclusive end of a window reaching the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

pub const MINUTES_PER_DAY: u16 = 24 * 60;

impl TimeOfDay {
    /// Exclusive end bound of a day-long window, rendered as "24:00".
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: i64) -> Option<Self> {
        if (0..=MINUTES_PER_DAY as i64).contains(&minutes) {
            Some(TimeOfDay(minutes as u16))
        } else {
            None
        }
    }

    /// Build from components already bounded by a clock read (hour < 24,
    /// minute < 60).
    pub fn from_hm(hour: u32, minute: u32) -> Self {
        TimeOfDay((hour * 60 + minute).min(MINUTES_PER_DAY as u32) as u16)
    }

    pub fn minutes(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(format!("invalid time format: {s}"));
        }
        let hour: u32 = parts[0]
            .parse()
            .map_err(|_| format!("invalid hour in: {s}"))?;
        let minute: u32 = parts[1]
            .parse()
            .map_err(|_| format!("invalid minute in: {s}"))?;
        // "24:00" marks the exclusive end of a day-long window.
        if (hour > 23 || minute > 59) && !(hour == 24 && minute == 0) {
            return Err(format!("time out of range: {s}"));
        }
        Ok(TimeOfDay((hour * 60 + minute) as u16))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One recurring weekly interval during which a provider accepts bookings.
/// Times are local to the provider's timezone; [start, end) half-open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHourWindow {
    pub id: String,
    pub provider_id: String,
    pub day_of_week: DayOfWeek,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl WorkingHourWindow {
    /// True when both windows fall on the same day and their half-open
    /// intervals intersect.
    pub fn overlaps(&self, other: &WorkingHourWindow) -> bool {
        self.day_of_week == other.day_of_week && self.start < other.end && other.start < self.end
    }
}
