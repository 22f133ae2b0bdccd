use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::DraftField;
use crate::domain::slot::{ServiceKind, SlotRequest, TimeSlot};

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleViolation {
    #[error("lunch is served only on Saturdays and Sundays")]
    ClosedDay { weekday: String },
    #[error("seatings run from {open} to {close}")]
    OutsideHours { open: NaiveTime, close: NaiveTime },
    #[error("last arrival for lunch is {last_arrival}")]
    AfterLastArrival { last_arrival: NaiveTime },
    #[error("stays starting {date} require at least {required} nights")]
    BelowMinimumStay { date: NaiveDate, required: u32, requested: u32 },
    #[error("the requested date {date} has already passed")]
    DateInPast { date: NaiveDate },
    #[error("party size must be at least 1")]
    EmptyParty,
    #[error("request is missing {0:?}")]
    Incomplete(DraftField),
}

/// When the house takes guests. Table service runs weekend lunches only;
/// the apartment takes stays of a minimum length that is stricter over
/// the summer months.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningRules {
    pub table_days: Vec<Weekday>,
    pub table_open: NaiveTime,
    pub table_last_arrival: NaiveTime,
    pub table_close: NaiveTime,
    pub room_min_nights: u32,
    pub room_min_nights_summer: u32,
}

impl Default for OpeningRules {
    fn default() -> Self {
        Self {
            table_days: vec![Weekday::Sat, Weekday::Sun],
            table_open: NaiveTime::from_hms_opt(12, 0, 0).expect("static time"),
            table_last_arrival: NaiveTime::from_hms_opt(15, 0, 0).expect("static time"),
            table_close: NaiveTime::from_hms_opt(20, 0, 0).expect("static time"),
            room_min_nights: 2,
            room_min_nights_summer: 3,
        }
    }
}

impl OpeningRules {
    /// Validate a request against business hours and materialize the
    /// concrete interval it would occupy. Returns the first violated rule.
    pub fn materialize(
        &self,
        request: &SlotRequest,
        today: NaiveDate,
    ) -> Result<TimeSlot, ScheduleViolation> {
        if request.party_size == 0 {
            return Err(ScheduleViolation::EmptyParty);
        }
        if request.date < today {
            return Err(ScheduleViolation::DateInPast { date: request.date });
        }

        match request.service {
            ServiceKind::Table => {
                let arrival =
                    request.time.ok_or(ScheduleViolation::Incomplete(DraftField::Time))?;
                if !self.table_days.contains(&request.date.weekday()) {
                    return Err(ScheduleViolation::ClosedDay {
                        weekday: request.date.weekday().to_string(),
                    });
                }
                if arrival < self.table_open || arrival > self.table_close {
                    return Err(ScheduleViolation::OutsideHours {
                        open: self.table_open,
                        close: self.table_close,
                    });
                }
                if arrival > self.table_last_arrival {
                    return Err(ScheduleViolation::AfterLastArrival {
                        last_arrival: self.table_last_arrival,
                    });
                }
                Ok(TimeSlot::table_seating(request.date, arrival))
            }
            ServiceKind::Room => {
                let nights =
                    request.nights.ok_or(ScheduleViolation::Incomplete(DraftField::Nights))?;
                let required = self.min_nights_for(request.date);
                if nights < required {
                    return Err(ScheduleViolation::BelowMinimumStay {
                        date: request.date,
                        required,
                        requested: nights,
                    });
                }
                Ok(TimeSlot::room_stay(request.date, nights))
            }
        }
    }

    /// Write-time re-check over an already materialized slot; the store
    /// runs this so a create can never slip past the hours rules even if
    /// the advisory path was skipped.
    pub fn validate_slot(
        &self,
        service: ServiceKind,
        slot: &TimeSlot,
        today: NaiveDate,
    ) -> Result<(), ScheduleViolation> {
        if slot.date() < today {
            return Err(ScheduleViolation::DateInPast { date: slot.date() });
        }
        if service == ServiceKind::Table {
            if !self.table_days.contains(&slot.date().weekday()) {
                return Err(ScheduleViolation::ClosedDay {
                    weekday: slot.date().weekday().to_string(),
                });
            }
            let arrival = slot.start.time();
            if arrival < self.table_open || arrival > self.table_close {
                return Err(ScheduleViolation::OutsideHours {
                    open: self.table_open,
                    close: self.table_close,
                });
            }
            if arrival > self.table_last_arrival {
                return Err(ScheduleViolation::AfterLastArrival {
                    last_arrival: self.table_last_arrival,
                });
            }
        }
        Ok(())
    }

    pub fn min_nights_for(&self, check_in: NaiveDate) -> u32 {
        if (6..=8).contains(&check_in.month()) {
            self.room_min_nights_summer
        } else {
            self.room_min_nights
        }
    }

    /// Arrival times offered when suggesting alternatives, on the hour
    /// from opening until last arrival.
    pub fn table_arrival_times(&self) -> Vec<NaiveTime> {
        let mut times = Vec::new();
        let mut current = self.table_open;
        while current <= self.table_last_arrival {
            times.push(current);
            current = current + chrono::Duration::hours(1);
        }
        times
    }
}
