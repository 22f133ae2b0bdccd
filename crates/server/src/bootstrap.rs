use std::sync::Arc;

use innkeep_agent::{ChatRouter, HttpLlmOracle, SessionRegistry};
use innkeep_core::config::{AppConfig, ConfigError, LoadOptions};
use innkeep_core::{KnowledgeStore, OpeningRules, ReservationStore};
use innkeep_db::{connect_with_settings, migrations, DbPool, SqlReservationRepository};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<dyn ReservationStore>,
    pub router: Arc<ChatRouter>,
    pub sessions: Arc<SessionRegistry>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm oracle setup failed: {0}")]
    Oracle(#[source] innkeep_agent::OracleError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        session_id = "unknown",
        reservation_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        session_id = "unknown",
        reservation_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        session_id = "unknown",
        reservation_id = "unknown",
        "database migrations applied"
    );

    // A missing corpus degrades the knowledge path to honest refusals;
    // it does not block startup.
    let knowledge = match KnowledgeStore::load(&config.knowledge.corpus_path) {
        Ok(store) => {
            info!(
                event_name = "system.bootstrap.knowledge_loaded",
                correlation_id = "bootstrap",
                session_id = "unknown",
                reservation_id = "unknown",
                documents = store.len(),
                "knowledge corpus loaded"
            );
            store
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.knowledge_missing",
                correlation_id = "bootstrap",
                session_id = "unknown",
                reservation_id = "unknown",
                path = %config.knowledge.corpus_path.display(),
                error = %error,
                "knowledge corpus unavailable; continuing with an empty store"
            );
            KnowledgeStore::empty()
        }
    };

    let oracle = HttpLlmOracle::from_config(&config.llm).map_err(BootstrapError::Oracle)?;
    let store: Arc<SqlReservationRepository> =
        Arc::new(SqlReservationRepository::new(db_pool.clone(), OpeningRules::default()));

    let router = Arc::new(ChatRouter::new(
        store.clone(),
        Arc::new(oracle),
        Arc::new(knowledge),
        OpeningRules::default(),
    ));

    Ok(Application {
        config,
        db_pool,
        store,
        router,
        sessions: Arc::new(SessionRegistry::new()),
    })
}

#[cfg(test)]
mod tests {
    use innkeep_core::config::{ConfigOverrides, LoadOptions};
    use innkeep_core::{ReservationStatus, ReservationStore};

    use super::bootstrap;

    fn memory_options(url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(url.to_string()),
                corpus_path: Some("does-not-exist.jsonl".into()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_migrates_and_wires_the_router() {
        let app = bootstrap(memory_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap succeeds");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'reservation'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("reservation table present");
        assert_eq!(table_count, 1);

        let pending =
            app.store.list(Some(ReservationStatus::Pending)).await.expect("store usable");
        assert!(pending.is_empty());
        assert!(app.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_config() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(String::new()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("empty database url must fail").to_string();
        assert!(message.contains("database.url"), "unexpected message: {message}");
    }
}
