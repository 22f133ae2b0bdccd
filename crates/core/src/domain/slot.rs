use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// The two bookable resources of the house: a lunch table in the dining
/// room or the guest apartment. Each is a single capacity unit, so two
/// active reservations of the same service may never overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Table,
    Room,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Some(Self::Table),
            "room" => Some(Self::Room),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table seating occupies the table for two hours from arrival.
pub const TABLE_SEATING_HOURS: i64 = 2;
/// Guests check into the apartment at 14:00.
pub const ROOM_CHECK_IN: (u32, u32) = (14, 0);
/// Guests check out of the apartment at 10:00.
pub const ROOM_CHECK_OUT: (u32, u32) = (10, 0);

/// A concrete occupied interval, half-open over combined date-time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// The interval a table seating occupies: arrival time plus the fixed
    /// seating window.
    pub fn table_seating(date: NaiveDate, arrival: NaiveTime) -> Self {
        let start = date.and_time(arrival);
        Self { start, end: start + chrono::Duration::hours(TABLE_SEATING_HOURS) }
    }

    /// The interval a room stay occupies: check-in on the first day through
    /// check-out after the last night.
    pub fn room_stay(check_in_date: NaiveDate, nights: u32) -> Self {
        let check_in = NaiveTime::from_hms_opt(ROOM_CHECK_IN.0, ROOM_CHECK_IN.1, 0)
            .unwrap_or(NaiveTime::MIN);
        let check_out = NaiveTime::from_hms_opt(ROOM_CHECK_OUT.0, ROOM_CHECK_OUT.1, 0)
            .unwrap_or(NaiveTime::MIN);
        let last_day = check_in_date
            .checked_add_days(chrono::Days::new(u64::from(nights)))
            .unwrap_or(check_in_date);
        Self { start: check_in_date.and_time(check_in), end: last_day.and_time(check_out) }
    }

    /// Half-open interval intersection; total over all slot pairs.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.date() == self.end.date() {
            write!(
                f,
                "{} {}-{}",
                self.start.format("%d.%m.%Y"),
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            )
        } else {
            write!(f, "{} - {}", self.start.format("%d.%m.%Y"), self.end.format("%d.%m.%Y"))
        }
    }
}

/// What a guest asked for, before business-hours validation has
/// materialized it into a concrete `TimeSlot`. `time` is meaningful for
/// table seatings, `nights` for room stays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub service: ServiceKind,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub party_size: u32,
    pub nights: Option<u32>,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::TimeSlot;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn table_seating_occupies_two_hours() {
        let slot = TimeSlot::table_seating(date(2026, 10, 10), time(13, 0));
        assert_eq!(slot.start, date(2026, 10, 10).and_time(time(13, 0)));
        assert_eq!(slot.end, date(2026, 10, 10).and_time(time(15, 0)));
    }

    #[test]
    fn room_stay_spans_check_in_to_check_out() {
        let slot = TimeSlot::room_stay(date(2026, 10, 9), 2);
        assert_eq!(slot.start, date(2026, 10, 9).and_time(time(14, 0)));
        assert_eq!(slot.end, date(2026, 10, 11).and_time(time(10, 0)));
    }

    #[test]
    fn adjacent_seatings_do_not_overlap() {
        let first = TimeSlot::table_seating(date(2026, 10, 10), time(12, 0));
        let second = TimeSlot::table_seating(date(2026, 10, 10), time(14, 0));
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn partially_shared_window_overlaps_in_both_directions() {
        let first = TimeSlot::table_seating(date(2026, 10, 10), time(13, 0));
        let second = TimeSlot::table_seating(date(2026, 10, 10), time(14, 0));
        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }

    #[test]
    fn back_to_back_room_stays_share_no_night() {
        let first = TimeSlot::room_stay(date(2026, 10, 9), 2);
        let second = TimeSlot::room_stay(date(2026, 10, 11), 2);
        // Check-out at 10:00, check-in at 14:00 on the same day.
        assert!(!first.overlaps(&second));
    }

    #[test]
    fn nested_room_stay_overlaps() {
        let outer = TimeSlot::room_stay(date(2026, 10, 9), 4);
        let inner = TimeSlot::room_stay(date(2026, 10, 10), 1);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }
}
