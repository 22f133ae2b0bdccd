use async_trait::async_trait;
use thiserror::Error;

use crate::availability::ReservationSource;
use crate::domain::reservation::{ContactInfo, Reservation, ReservationId, ReservationStatus};
use crate::domain::session::DraftField;
use crate::domain::slot::{ServiceKind, TimeSlot};
use crate::errors::DomainError;
use crate::schedule::ScheduleViolation;

/// Input to `ReservationStore::create`. The slot is already materialized;
/// the store still re-validates hours and conflicts before writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    pub service: ServiceKind,
    pub slot: TimeSlot,
    pub party_size: u32,
    pub nights: Option<u32>,
    pub contact: ContactInfo,
    pub note: Option<String>,
}

impl NewReservation {
    /// Required fields the draft must have filled before a create is even
    /// attempted. The store rejects incomplete input with `Validation`.
    pub fn missing_fields(&self) -> Vec<DraftField> {
        let mut missing = Vec::new();
        if self.party_size == 0 {
            missing.push(DraftField::PartySize);
        }
        if self.contact.name.trim().is_empty() {
            missing.push(DraftField::Name);
        }
        if !self.contact.is_reachable() && !self.contact.name.trim().is_empty() {
            missing.push(DraftField::Contact);
        }
        if self.service == ServiceKind::Room && self.nights.is_none() {
            missing.push(DraftField::Nights);
        }
        missing
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reservation draft is incomplete: {missing:?}")]
    Validation { missing: Vec<DraftField> },
    #[error("requested slot is outside business hours: {0}")]
    OutsideBusinessHours(#[from] ScheduleViolation),
    #[error("requested slot overlaps {} active reservation(s)", .conflicts.len())]
    Conflict { conflicts: Vec<Reservation> },
    #[error("reservation not found: {0}")]
    NotFound(ReservationId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence contract for reservations. `create` is the serialization
/// point for the check-then-act race: implementations must perform the
/// overlap check and the insert as one atomic step, so the availability
/// checker's earlier answer is advisory only.
#[async_trait]
pub trait ReservationStore: ReservationSource {
    /// Persist a new reservation as `Pending`. Fails with `Validation`
    /// on incomplete input, `OutsideBusinessHours` when the slot breaks
    /// the hours rules, and `Conflict` when an active reservation
    /// overlaps.
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    async fn find_by_id(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError>;

    async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Admin collaborator contract: only `Pending` reservations accept a
    /// transition, enforced by the domain state machine.
    async fn transition(
        &self,
        id: &ReservationId,
        to: ReservationStatus,
    ) -> Result<Reservation, StoreError>;
}
