use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::reservation::Reservation;
use crate::domain::slot::{ServiceKind, SlotRequest, TimeSlot};
use crate::schedule::{OpeningRules, ScheduleViolation};
use crate::store::StoreError;

/// Read side of the reservation store the checker consults. Both the SQL
/// repository and the in-memory test repository implement it.
#[async_trait]
pub trait ReservationSource: Send + Sync {
    /// Reservations with an active status (`pending` or `confirmed`)
    /// whose slot overlaps the given one, for the same service.
    async fn active_overlapping(
        &self,
        service: ServiceKind,
        slot: &TimeSlot,
    ) -> Result<Vec<Reservation>, StoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AvailabilityReason {
    Open,
    OutsideBusinessHours { violation: ScheduleViolation },
    Conflict,
}

/// Result of an availability check. Advisory: the store re-checks inside
/// the create transaction, so a stale `Open` here can still end in a
/// `Conflict` at write time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub is_available: bool,
    pub reason: AvailabilityReason,
    pub slot: Option<TimeSlot>,
    pub conflicts: Vec<Reservation>,
    pub alternatives: Vec<TimeSlot>,
}

impl Availability {
    fn open(slot: TimeSlot) -> Self {
        Self {
            is_available: true,
            reason: AvailabilityReason::Open,
            slot: Some(slot),
            conflicts: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    fn outside_hours(violation: ScheduleViolation) -> Self {
        Self {
            is_available: false,
            reason: AvailabilityReason::OutsideBusinessHours { violation },
            slot: None,
            conflicts: Vec::new(),
            alternatives: Vec::new(),
        }
    }
}

const MAX_ALTERNATIVES: usize = 3;

pub struct AvailabilityChecker {
    rules: OpeningRules,
}

impl AvailabilityChecker {
    pub fn new(rules: OpeningRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OpeningRules {
        &self.rules
    }

    /// Evaluate in order: business-hours rules, then overlap against
    /// active reservations. On conflict the result carries up to three
    /// free alternative slots.
    pub async fn check<S>(
        &self,
        source: &S,
        request: &SlotRequest,
        today: NaiveDate,
    ) -> Result<Availability, StoreError>
    where
        S: ReservationSource + ?Sized,
    {
        let slot = match self.rules.materialize(request, today) {
            Ok(slot) => slot,
            Err(violation) => return Ok(Availability::outside_hours(violation)),
        };

        let conflicts = source.active_overlapping(request.service, &slot).await?;
        if conflicts.is_empty() {
            return Ok(Availability::open(slot));
        }

        let alternatives = self.suggest_alternatives(source, request, today).await?;
        Ok(Availability {
            is_available: false,
            reason: AvailabilityReason::Conflict,
            slot: Some(slot),
            conflicts,
            alternatives,
        })
    }

    /// Nearby free slots after a conflict: other seatings the same day
    /// and the following weekend for tables, later check-in dates of the
    /// same length for rooms.
    async fn suggest_alternatives<S>(
        &self,
        source: &S,
        request: &SlotRequest,
        today: NaiveDate,
    ) -> Result<Vec<TimeSlot>, StoreError>
    where
        S: ReservationSource + ?Sized,
    {
        let mut suggestions = Vec::new();

        match request.service {
            ServiceKind::Table => {
                let mut candidates: Vec<SlotRequest> = Vec::new();
                for arrival in self.rules.table_arrival_times() {
                    if Some(arrival) != request.time {
                        candidates.push(SlotRequest { time: Some(arrival), ..*request });
                    }
                }
                // Same seating time on the next days lunch is served.
                let mut day = request.date;
                let mut scanned = 0;
                while scanned < 7 {
                    day = match day.succ_opt() {
                        Some(next) => next,
                        None => break,
                    };
                    scanned += 1;
                    if self.rules.table_days.contains(&day.weekday()) {
                        candidates.push(SlotRequest { date: day, ..*request });
                    }
                }
                self.collect_free(source, &candidates, today, &mut suggestions).await?;
            }
            ServiceKind::Room => {
                let shift = u64::from(request.nights.unwrap_or(1).max(1));
                let mut day = request.date;
                let mut candidates = Vec::new();
                for _ in 0..4 {
                    day = match day.checked_add_days(chrono::Days::new(shift)) {
                        Some(next) => next,
                        None => break,
                    };
                    candidates.push(SlotRequest { date: day, ..*request });
                }
                self.collect_free(source, &candidates, today, &mut suggestions).await?;
            }
        }

        Ok(suggestions)
    }

    async fn collect_free<S>(
        &self,
        source: &S,
        candidates: &[SlotRequest],
        today: NaiveDate,
        suggestions: &mut Vec<TimeSlot>,
    ) -> Result<(), StoreError>
    where
        S: ReservationSource + ?Sized,
    {
        for candidate in candidates {
            if suggestions.len() >= MAX_ALTERNATIVES {
                break;
            }
            let Ok(slot) = self.rules.materialize(candidate, today) else {
                continue;
            };
            if source.active_overlapping(candidate.service, &slot).await?.is_empty() {
                suggestions.push(slot);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, Utc};

    use crate::domain::reservation::{
        ContactInfo, Reservation, ReservationId, ReservationStatus,
    };
    use crate::domain::slot::{ServiceKind, SlotRequest, TimeSlot};
    use crate::schedule::OpeningRules;
    use crate::store::StoreError;

    use super::{AvailabilityChecker, AvailabilityReason, ReservationSource};

    #[derive(Default)]
    struct FixedSource {
        reservations: Mutex<Vec<Reservation>>,
    }

    impl FixedSource {
        fn with(reservations: Vec<Reservation>) -> Self {
            Self { reservations: Mutex::new(reservations) }
        }
    }

    #[async_trait]
    impl ReservationSource for FixedSource {
        async fn active_overlapping(
            &self,
            service: ServiceKind,
            slot: &TimeSlot,
        ) -> Result<Vec<Reservation>, StoreError> {
            let reservations = self.reservations.lock().expect("lock");
            Ok(reservations
                .iter()
                .filter(|r| {
                    r.service == service && r.status.is_active() && r.slot.overlaps(slot)
                })
                .cloned()
                .collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn table_reservation(d: NaiveDate, arrival: NaiveTime, status: ReservationStatus) -> Reservation {
        Reservation {
            id: ReservationId::generate(),
            service: ServiceKind::Table,
            slot: TimeSlot::table_seating(d, arrival),
            party_size: 4,
            nights: None,
            contact: ContactInfo {
                name: "Ana Novak".to_string(),
                phone: Some("031111222".to_string()),
                email: None,
            },
            note: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const TODAY: fn() -> NaiveDate = || date(2026, 10, 1);

    fn saturday_request(arrival: NaiveTime) -> SlotRequest {
        // 2026-10-10 is a Saturday.
        SlotRequest {
            service: ServiceKind::Table,
            date: date(2026, 10, 10),
            time: Some(arrival),
            party_size: 4,
            nights: None,
        }
    }

    #[tokio::test]
    async fn free_weekend_slot_is_open() {
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let source = FixedSource::default();

        let availability = checker
            .check(&source, &saturday_request(time(13, 0)), TODAY())
            .await
            .expect("check");

        assert!(availability.is_available);
        assert_eq!(availability.reason, AvailabilityReason::Open);
        assert!(availability.conflicts.is_empty());
    }

    #[tokio::test]
    async fn slot_outside_business_hours_reports_the_violation() {
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let source = FixedSource::default();

        // Wednesday lunch: the dining room is closed.
        let request = SlotRequest { date: date(2026, 10, 14), ..saturday_request(time(13, 0)) };
        let availability = checker.check(&source, &request, TODAY()).await.expect("check");

        assert!(!availability.is_available);
        assert!(matches!(
            availability.reason,
            AvailabilityReason::OutsideBusinessHours { .. }
        ));
        assert!(availability.conflicts.is_empty());
    }

    #[tokio::test]
    async fn overlapping_pending_reservation_is_a_conflict() {
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let source = FixedSource::with(vec![table_reservation(
            date(2026, 10, 10),
            time(13, 0),
            ReservationStatus::Pending,
        )]);

        let availability = checker
            .check(&source, &saturday_request(time(14, 0)), TODAY())
            .await
            .expect("check");

        assert!(!availability.is_available);
        assert_eq!(availability.reason, AvailabilityReason::Conflict);
        assert_eq!(availability.conflicts.len(), 1);
        assert!(!availability.alternatives.is_empty(), "free seatings exist the same day");
    }

    #[tokio::test]
    async fn rejected_reservations_do_not_block_the_slot() {
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let source = FixedSource::with(vec![table_reservation(
            date(2026, 10, 10),
            time(13, 0),
            ReservationStatus::Rejected,
        )]);

        let availability = checker
            .check(&source, &saturday_request(time(13, 0)), TODAY())
            .await
            .expect("check");

        assert!(availability.is_available);
    }

    #[tokio::test]
    async fn conflict_alternatives_skip_occupied_seatings() {
        let checker = AvailabilityChecker::new(OpeningRules::default());
        // 12:00 and 13:00 taken; requesting 13:00 should suggest later ones.
        let source = FixedSource::with(vec![
            table_reservation(date(2026, 10, 10), time(12, 0), ReservationStatus::Confirmed),
            table_reservation(date(2026, 10, 10), time(13, 0), ReservationStatus::Pending),
        ]);

        let availability = checker
            .check(&source, &saturday_request(time(13, 0)), TODAY())
            .await
            .expect("check");

        assert!(!availability.is_available);
        for alternative in &availability.alternatives {
            let overlapping = source
                .active_overlapping(ServiceKind::Table, alternative)
                .await
                .expect("overlap query");
            assert!(overlapping.is_empty(), "suggested slot must be free");
        }
    }
}
