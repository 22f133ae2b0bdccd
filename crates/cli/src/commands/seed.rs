use chrono::{Datelike, Days, NaiveTime, Utc, Weekday};

use crate::commands::CommandResult;
use innkeep_core::config::{AppConfig, LoadOptions};
use innkeep_core::{
    ContactInfo, NewReservation, OpeningRules, ReservationStore, ServiceKind, StoreError,
    TimeSlot,
};
use innkeep_db::{connect_with_settings, migrations, SqlReservationRepository};

/// Seed a small, deterministic demo dataset: one table seating on the
/// coming Saturday and one weekend room stay. Conflicting seeds (from a
/// previous run) are counted as skips, not errors.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = SqlReservationRepository::new(pool.clone(), OpeningRules::default());
        let mut created = 0usize;
        let mut skipped = 0usize;
        for reservation in demo_reservations() {
            match store.create(reservation).await {
                Ok(_) => created += 1,
                Err(StoreError::Conflict { .. }) => skipped += 1,
                Err(error) => return Err(("seed_write", error.to_string(), 6u8)),
            }
        }
        pool.close().await;
        Ok::<(usize, usize), (&'static str, String, u8)>((created, skipped))
    });

    match result {
        Ok((created, skipped)) => CommandResult::success(
            "seed",
            format!("created {created} demo reservation(s), skipped {skipped} existing"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn demo_reservations() -> Vec<NewReservation> {
    let today = Utc::now().date_naive();
    let mut saturday = today;
    while saturday.weekday() != Weekday::Sat {
        saturday = saturday.checked_add_days(Days::new(1)).unwrap_or(saturday);
    }
    // Keep clear of the "date in the past" rule when seeding on a Saturday.
    if saturday == today {
        saturday = saturday.checked_add_days(Days::new(7)).unwrap_or(saturday);
    }

    let lunch = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or(NaiveTime::MIN);
    vec![
        NewReservation {
            service: ServiceKind::Table,
            slot: TimeSlot::table_seating(saturday, lunch),
            party_size: 4,
            nights: None,
            contact: ContactInfo {
                name: "Demo Gost".to_string(),
                phone: Some("031000111".to_string()),
                email: None,
            },
            note: Some("demo seed".to_string()),
        },
        NewReservation {
            service: ServiceKind::Room,
            slot: TimeSlot::room_stay(saturday, 3),
            party_size: 2,
            nights: Some(3),
            contact: ContactInfo {
                name: "Demo Družina".to_string(),
                phone: None,
                email: Some("demo@example.com".to_string()),
            },
            note: Some("demo seed".to_string()),
        },
    ]
}
