//! Admin collaborator surface: list reservations and move pending ones
//! to their terminal state. The state machine in the core decides what
//! is legal; this layer only translates the verdict to HTTP.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use innkeep_core::{Reservation, ReservationId, ReservationStatus, StoreError};

use crate::chat::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn list_reservations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Reservation>>, (StatusCode, Json<ErrorBody>)> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match ReservationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody { error: format!("unknown status `{raw}`") }),
                ))
            }
        },
    };

    state
        .store
        .list(status)
        .await
        .map(Json)
        .map_err(|error| store_error_response(&error))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, (StatusCode, Json<ErrorBody>)> {
    transition(state, id, ReservationStatus::Confirmed).await
}

pub async fn reject_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, (StatusCode, Json<ErrorBody>)> {
    transition(state, id, ReservationStatus::Rejected).await
}

async fn transition(
    state: AppState,
    id: String,
    to: ReservationStatus,
) -> Result<Json<Reservation>, (StatusCode, Json<ErrorBody>)> {
    let id = ReservationId(id);
    let reservation = state
        .store
        .transition(&id, to)
        .await
        .map_err(|error| store_error_response(&error))?;

    info!(
        event_name = "admin.reservation_transitioned",
        correlation_id = "admin",
        session_id = "unknown",
        reservation_id = %reservation.id,
        to_status = reservation.status.as_str(),
        "reservation status updated"
    );
    Ok(Json(reservation))
}

fn store_error_response(error: &StoreError) -> (StatusCode, Json<ErrorBody>) {
    let status = match error {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Domain(_) => StatusCode::CONFLICT,
        StoreError::Validation { .. } | StoreError::OutsideBusinessHours(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ErrorBody { error: error.to_string() }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use chrono::{NaiveDate, NaiveTime};

    use innkeep_agent::{ChatRouter, ScriptedOracle, SessionRegistry};
    use innkeep_core::{
        ContactInfo, KnowledgeStore, NewReservation, OpeningRules, Reservation,
        ReservationStatus, ReservationStore, ServiceKind, TimeSlot,
    };
    use innkeep_db::InMemoryReservationRepository;

    use crate::chat::AppState;

    use super::{confirm_reservation, list_reservations, reject_reservation, ListParams};

    fn state() -> (AppState, Arc<InMemoryReservationRepository>) {
        let store = Arc::new(InMemoryReservationRepository::default());
        let router = Arc::new(ChatRouter::new(
            store.clone(),
            Arc::new(ScriptedOracle::default()),
            Arc::new(KnowledgeStore::empty()),
            OpeningRules::default(),
        ));
        (
            AppState { router, sessions: Arc::new(SessionRegistry::new()), store: store.clone() },
            store,
        )
    }

    async fn seeded_reservation(store: &InMemoryReservationRepository) -> Reservation {
        // 2030-06-01 is a Saturday.
        store
            .create(NewReservation {
                service: ServiceKind::Table,
                slot: TimeSlot::table_seating(
                    NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid date"),
                    NaiveTime::from_hms_opt(13, 0, 0).expect("valid time"),
                ),
                party_size: 4,
                nights: None,
                contact: ContactInfo {
                    name: "Ana Novak".to_string(),
                    phone: Some("031111222".to_string()),
                    email: None,
                },
                note: None,
            })
            .await
            .expect("seed reservation")
    }

    #[tokio::test]
    async fn listing_filters_by_status() {
        let (state, store) = state();
        seeded_reservation(&store).await;

        let listed = list_reservations(
            State(state.clone()),
            Query(ListParams { status: Some("pending".to_string()) }),
        )
        .await
        .expect("list")
        .0;
        assert_eq!(listed.len(), 1);

        let confirmed = list_reservations(
            State(state),
            Query(ListParams { status: Some("confirmed".to_string()) }),
        )
        .await
        .expect("list")
        .0;
        assert!(confirmed.is_empty());
    }

    #[tokio::test]
    async fn unknown_status_filter_is_a_bad_request() {
        let (state, _store) = state();
        let error = list_reservations(
            State(state),
            Query(ListParams { status: Some("parked".to_string()) }),
        )
        .await
        .err()
        .expect("bad request");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_moves_pending_to_confirmed() {
        let (state, store) = state();
        let reservation = seeded_reservation(&store).await;

        let confirmed =
            confirm_reservation(State(state), Path(reservation.id.0.clone())).await.expect("ok").0;
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn rejecting_a_confirmed_reservation_conflicts() {
        let (state, store) = state();
        let reservation = seeded_reservation(&store).await;
        store
            .transition(&reservation.id, ReservationStatus::Confirmed)
            .await
            .expect("confirm");

        let error = reject_reservation(State(state), Path(reservation.id.0.clone()))
            .await
            .err()
            .expect("terminal state is frozen");
        assert_eq!(error.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let (state, _store) = state();
        let error = confirm_reservation(State(state), Path("missing".to_string()))
            .await
            .err()
            .expect("not found");
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }
}
