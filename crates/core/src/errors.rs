use thiserror::Error;

use crate::domain::reservation::ReservationStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid reservation transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: ReservationStatus, to: ReservationStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Routing-level failures. `Unavailable` covers oracle outages and
/// timeouts and is always recovered locally by the deterministic paths;
/// `ToolMisuse` is the post-condition breach where the model asserted
/// availability without the check tool.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("language model unavailable: {0}")]
    Unavailable(String),
    #[error("model asserted availability without a check_availability call ({attempts} attempts)")]
    ToolMisuse { attempts: u32 },
}
