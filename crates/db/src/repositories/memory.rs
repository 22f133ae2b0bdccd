use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use innkeep_core::{
    NewReservation, OpeningRules, Reservation, ReservationId, ReservationSource,
    ReservationStatus, ReservationStore, ServiceKind, StoreError, TimeSlot,
};

/// In-memory store used by tests and local smoke runs. The write lock
/// makes the conflict-check-plus-insert atomic, the same guarantee the
/// SQL repository gets from its transaction and write gate.
#[derive(Default)]
pub struct InMemoryReservationRepository {
    rules: OpeningRules,
    reservations: RwLock<HashMap<String, Reservation>>,
}

impl InMemoryReservationRepository {
    pub fn new(rules: OpeningRules) -> Self {
        Self { rules, reservations: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl ReservationSource for InMemoryReservationRepository {
    async fn active_overlapping(
        &self,
        service: ServiceKind,
        slot: &TimeSlot,
    ) -> Result<Vec<Reservation>, StoreError> {
        let reservations = self.reservations.read().await;
        let mut overlapping: Vec<Reservation> = reservations
            .values()
            .filter(|r| r.service == service && r.status.is_active() && r.slot.overlaps(slot))
            .cloned()
            .collect();
        overlapping.sort_by_key(|r| r.slot.start);
        Ok(overlapping)
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationRepository {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let missing = new.missing_fields();
        if !missing.is_empty() {
            return Err(StoreError::Validation { missing });
        }
        self.rules.validate_slot(new.service, &new.slot, Utc::now().date_naive())?;

        let mut reservations = self.reservations.write().await;
        let mut conflicts: Vec<Reservation> = reservations
            .values()
            .filter(|r| {
                r.service == new.service && r.status.is_active() && r.slot.overlaps(&new.slot)
            })
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort_by_key(|r| r.slot.start);
            return Err(StoreError::Conflict { conflicts });
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: ReservationId::generate(),
            service: new.service,
            slot: new.slot,
            party_size: new.party_size,
            nights: new.nights,
            contact: new.contact,
            note: new.note,
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        reservations.insert(reservation.id.0.clone(), reservation.clone());
        Ok(reservation)
    }

    async fn find_by_id(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError> {
        let reservations = self.reservations.read().await;
        Ok(reservations.get(&id.0).cloned())
    }

    async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let reservations = self.reservations.read().await;
        let mut listed: Vec<Reservation> = reservations
            .values()
            .filter(|r| status.map_or(true, |wanted| r.status == wanted))
            .cloned()
            .collect();
        listed.sort_by_key(|r| (r.slot.start, r.created_at));
        Ok(listed)
    }

    async fn transition(
        &self,
        id: &ReservationId,
        to: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let mut reservations = self.reservations.write().await;
        let reservation =
            reservations.get_mut(&id.0).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        reservation.transition_to(to)?;
        Ok(reservation.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use innkeep_core::{
        ContactInfo, NewReservation, ReservationStatus, ReservationStore, ServiceKind,
        StoreError, TimeSlot,
    };

    use super::InMemoryReservationRepository;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn room_stay(check_in: NaiveDate, nights: u32) -> NewReservation {
        NewReservation {
            service: ServiceKind::Room,
            slot: TimeSlot::room_stay(check_in, nights),
            party_size: 2,
            nights: Some(nights),
            contact: ContactInfo {
                name: "Marko Satler".to_string(),
                phone: None,
                email: Some("marko@example.com".to_string()),
            },
            note: None,
        }
    }

    #[tokio::test]
    async fn room_stays_conflict_when_nights_overlap() {
        let repo = InMemoryReservationRepository::default();

        repo.create(room_stay(date(2030, 10, 4), 2)).await.expect("first stay");
        let error = repo
            .create(room_stay(date(2030, 10, 5), 2))
            .await
            .expect_err("overlapping stay must fail");
        assert!(matches!(error, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn back_to_back_room_stays_are_both_accepted() {
        let repo = InMemoryReservationRepository::default();

        repo.create(room_stay(date(2030, 10, 4), 2)).await.expect("first stay");
        repo.create(room_stay(date(2030, 10, 6), 2)).await.expect("second stay");

        let pending = repo.list(Some(ReservationStatus::Pending)).await.expect("list");
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn table_and_room_do_not_contend_for_the_same_calendar() {
        let repo = InMemoryReservationRepository::default();

        // Saturday 2030-06-01: one lunch table, one room stay.
        repo.create(room_stay(date(2030, 6, 1), 3)).await.expect("room stay");
        let table = NewReservation {
            service: ServiceKind::Table,
            slot: TimeSlot::table_seating(date(2030, 6, 1), time(13, 0)),
            party_size: 4,
            nights: None,
            contact: ContactInfo {
                name: "Ana Novak".to_string(),
                phone: Some("031111222".to_string()),
                email: None,
            },
            note: None,
        };
        repo.create(table).await.expect("table seating");
    }

    #[tokio::test]
    async fn concurrent_creates_for_the_same_stay_commit_exactly_one() {
        let repo = Arc::new(InMemoryReservationRepository::default());

        let left = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.create(room_stay(date(2030, 10, 4), 2)).await })
        };
        let right = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.create(room_stay(date(2030, 10, 4), 2)).await })
        };

        let outcomes = [left.await.expect("join"), right.await.expect("join")];
        let succeeded = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(succeeded, 1);

        let pending = repo.list(Some(ReservationStatus::Pending)).await.expect("list");
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn transition_rejects_unknown_ids() {
        let repo = InMemoryReservationRepository::default();
        let error = repo
            .transition(
                &innkeep_core::ReservationId("missing".to_string()),
                ReservationStatus::Confirmed,
            )
            .await
            .expect_err("unknown id");
        assert!(matches!(error, StoreError::NotFound(_)));
    }
}
