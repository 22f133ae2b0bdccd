pub mod memory;
pub mod reservation;

pub use memory::InMemoryReservationRepository;
pub use reservation::SqlReservationRepository;

use innkeep_core::StoreError;

pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode(message: impl Into<String>) -> StoreError {
    StoreError::Backend(message.into())
}
