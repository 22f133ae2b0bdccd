use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::slot::{ServiceKind, TimeSlot};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl ReservationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Pending` is the only state the booking flow may write. `Confirmed`
/// and `Rejected` are terminal and reachable only through the admin
/// transition contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Statuses that occupy a slot for conflict purposes.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ContactInfo {
    /// A contact is reachable when we have a name plus at least one channel.
    pub fn is_reachable(&self) -> bool {
        !self.name.trim().is_empty()
            && (self.phone.as_deref().is_some_and(|p| !p.is_empty())
                || self.email.as_deref().is_some_and(|e| !e.is_empty()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub service: ServiceKind,
    pub slot: TimeSlot,
    pub party_size: u32,
    pub nights: Option<u32>,
    pub contact: ContactInfo,
    pub note: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self.status, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Pending, ReservationStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: ReservationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = Utc::now();
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use crate::domain::slot::{ServiceKind, TimeSlot};
    use crate::errors::DomainError;

    use super::{ContactInfo, Reservation, ReservationId, ReservationStatus};

    fn reservation(status: ReservationStatus) -> Reservation {
        let date = NaiveDate::from_ymd_opt(2026, 10, 10).expect("valid date");
        let arrival = NaiveTime::from_hms_opt(13, 0, 0).expect("valid time");
        Reservation {
            id: ReservationId("R-1".to_string()),
            service: ServiceKind::Table,
            slot: TimeSlot::table_seating(date, arrival),
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

    #[test]
    fn pending_can_be_confirmed() {
        let mut r = reservation(ReservationStatus::Pending);
        r.transition_to(ReservationStatus::Confirmed).expect("pending -> confirmed");
        assert_eq!(r.status, ReservationStatus::Confirmed);
    }

    #[test]
    fn pending_can_be_rejected() {
        let mut r = reservation(ReservationStatus::Pending);
        r.transition_to(ReservationStatus::Rejected).expect("pending -> rejected");
        assert_eq!(r.status, ReservationStatus::Rejected);
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [ReservationStatus::Confirmed, ReservationStatus::Rejected] {
            for next in [
                ReservationStatus::Pending,
                ReservationStatus::Confirmed,
                ReservationStatus::Rejected,
            ] {
                let mut r = reservation(terminal);
                let error = r.transition_to(next).expect_err("terminal state must be frozen");
                assert!(matches!(error, DomainError::InvalidStatusTransition { .. }));
            }
        }
    }

    #[test]
    fn rejected_reservations_free_the_slot() {
        assert!(ReservationStatus::Pending.is_active());
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(!ReservationStatus::Rejected.is_active());
    }

    #[test]
    fn contact_requires_name_and_channel() {
        let no_channel =
            ContactInfo { name: "Ana".to_string(), phone: None, email: None };
        assert!(!no_channel.is_reachable());

        let with_email = ContactInfo {
            name: "Ana".to_string(),
            phone: None,
            email: Some("ana@example.com".to_string()),
        };
        assert!(with_email.is_reachable());
    }
}
