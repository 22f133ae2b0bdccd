//! Domain core of the innkeep booking assistant.
//!
//! Everything in this crate is deterministic: the reservation lifecycle,
//! the business-hours rules, the availability checker, the lexical
//! knowledge retriever, and the conversation/draft model. The language
//! model never makes a decision that lives here; it only translates
//! guest messages into structured requests that these types validate.

pub mod availability;
pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod schedule;
pub mod store;

pub use availability::{Availability, AvailabilityChecker, AvailabilityReason, ReservationSource};
pub use domain::reservation::{
    ContactInfo, Reservation, ReservationId, ReservationStatus,
};
pub use domain::session::{ConversationSession, DraftField, ReservationDraft, Turn, TurnRole};
pub use domain::slot::{ServiceKind, SlotRequest, TimeSlot};
pub use errors::{DomainError, RoutingError};
pub use knowledge::{DocumentId, KnowledgeDocument, KnowledgeStore, Retriever, ScoredDocument};
pub use schedule::{OpeningRules, ScheduleViolation};
pub use store::{NewReservation, ReservationStore, StoreError};

pub use chrono;
