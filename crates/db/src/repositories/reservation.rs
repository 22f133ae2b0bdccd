use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::Mutex;

use innkeep_core::{
    ContactInfo, NewReservation, OpeningRules, Reservation, ReservationId, ReservationSource,
    ReservationStatus, ReservationStore, ServiceKind, StoreError, TimeSlot,
};

use super::{backend, decode};
use crate::DbPool;

/// Slot instants are persisted in this fixed-width format so SQL string
/// comparison is chronological.
const SLOT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const SELECT_COLUMNS: &str = "id, service, slot_start, slot_end, party_size, nights, \
     contact_name, contact_phone, contact_email, note, status, created_at, updated_at";

pub struct SqlReservationRepository {
    pool: DbPool,
    rules: OpeningRules,
    /// Serializes creates. Together with the in-transaction conflict
    /// re-check this closes the check-then-act race: the advisory
    /// availability answer a conversation saw earlier carries no
    /// authority here.
    write_gate: Mutex<()>,
}

impl SqlReservationRepository {
    pub fn new(pool: DbPool, rules: OpeningRules) -> Self {
        Self { pool, rules, write_gate: Mutex::new(()) }
    }
}

#[async_trait]
impl ReservationSource for SqlReservationRepository {
    async fn active_overlapping(
        &self,
        service: ServiceKind,
        slot: &TimeSlot,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservation \
             WHERE service = ? AND status IN ('pending', 'confirmed') \
               AND slot_start < ? AND ? < slot_end \
             ORDER BY slot_start ASC"
        ))
        .bind(service.as_str())
        .bind(format_slot_instant(&slot.end))
        .bind(format_slot_instant(&slot.start))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(reservation_from_row).collect()
    }
}

#[async_trait]
impl ReservationStore for SqlReservationRepository {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let missing = new.missing_fields();
        if !missing.is_empty() {
            return Err(StoreError::Validation { missing });
        }
        self.rules.validate_slot(new.service, &new.slot, Utc::now().date_naive())?;

        let _write = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Authoritative conflict re-check, inside the same transaction as
        // the insert.
        let conflicting = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservation \
             WHERE service = ? AND status IN ('pending', 'confirmed') \
               AND slot_start < ? AND ? < slot_end \
             ORDER BY slot_start ASC"
        ))
        .bind(new.service.as_str())
        .bind(format_slot_instant(&new.slot.end))
        .bind(format_slot_instant(&new.slot.start))
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        if !conflicting.is_empty() {
            let conflicts = conflicting
                .into_iter()
                .map(reservation_from_row)
                .collect::<Result<Vec<_>, _>>()?;
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

        sqlx::query(
            "INSERT INTO reservation (
                id, service, slot_start, slot_end, party_size, nights,
                contact_name, contact_phone, contact_email, note, status,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reservation.id.0)
        .bind(reservation.service.as_str())
        .bind(format_slot_instant(&reservation.slot.start))
        .bind(format_slot_instant(&reservation.slot.end))
        .bind(i64::from(reservation.party_size))
        .bind(reservation.nights.map(i64::from))
        .bind(&reservation.contact.name)
        .bind(reservation.contact.phone.as_deref())
        .bind(reservation.contact.email.as_deref())
        .bind(reservation.note.as_deref())
        .bind(reservation.status.as_str())
        .bind(reservation.created_at.to_rfc3339())
        .bind(reservation.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(reservation)
    }

    async fn find_by_id(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservation WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(reservation_from_row).transpose()
    }

    async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM reservation WHERE status = ? \
                 ORDER BY slot_start ASC, created_at ASC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM reservation \
                 ORDER BY slot_start ASC, created_at ASC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
        };

        rows.into_iter().map(reservation_from_row).collect()
    }

    async fn transition(
        &self,
        id: &ReservationId,
        to: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let _write = self.write_gate.lock().await;

        let mut reservation = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let from = reservation.status;
        reservation.transition_to(to)?;

        let updated = sqlx::query(
            "UPDATE reservation SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(reservation.status.as_str())
        .bind(reservation.updated_at.to_rfc3339())
        .bind(&id.0)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if updated.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "reservation {id} changed concurrently during transition"
            )));
        }

        Ok(reservation)
    }
}

fn format_slot_instant(instant: &NaiveDateTime) -> String {
    instant.format(SLOT_FORMAT).to_string()
}

fn parse_slot_instant(raw: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(raw, SLOT_FORMAT)
        .map_err(|_| decode(format!("unreadable slot instant `{raw}`")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|_| decode(format!("unreadable timestamp `{raw}`")))
}

fn reservation_from_row(row: SqliteRow) -> Result<Reservation, StoreError> {
    let service_raw: String = row.get("service");
    let service = ServiceKind::parse(&service_raw)
        .ok_or_else(|| decode(format!("unknown service `{service_raw}`")))?;
    let status_raw: String = row.get("status");
    let status = ReservationStatus::parse(&status_raw)
        .ok_or_else(|| decode(format!("unknown status `{status_raw}`")))?;

    Ok(Reservation {
        id: ReservationId(row.get("id")),
        service,
        slot: TimeSlot {
            start: parse_slot_instant(&row.get::<String, _>("slot_start"))?,
            end: parse_slot_instant(&row.get::<String, _>("slot_end"))?,
        },
        party_size: row.get::<i64, _>("party_size") as u32,
        nights: row.get::<Option<i64>, _>("nights").map(|nights| nights as u32),
        contact: ContactInfo {
            name: row.get("contact_name"),
            phone: row.get("contact_phone"),
            email: row.get("contact_email"),
        },
        note: row.get("note"),
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
