use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::working_hours::TimeOfDay;

/// A bookable interval in the provider's local timezone. Derived on demand
/// from working hours and existing bookings, never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_json_shape() {
        let slot = Slot {
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            start: "09:00".parse().unwrap(),
            end: "09:30".parse().unwrap(),
        };
        assert_eq!(
            serde_json::to_string(&slot).unwrap(),
            r#"{"date":"2025-06-16","start":"09:00","end":"09:30"}"#
        );
    }

    #[test]
    fn test_slot_ordering_by_date_then_start() {
        let mk = |d: u32, s: &str| Slot {
            date: NaiveDate::from_ymd_opt(2025, 6, d).unwrap(),
            start: s.parse().unwrap(),
            end: "23:59".parse().unwrap(),
        };
        let mut slots = vec![mk(17, "09:00"), mk(16, "14:00"), mk(16, "09:00")];
        slots.sort();
        assert_eq!(slots[0].date.to_string(), "2025-06-16");
        assert_eq!(slots[0].start.to_string(), "09:00");
        assert_eq!(slots[1].start.to_string(), "14:00");
        assert_eq!(slots[2].date.to_string(), "2025-06-17");
    }
}
