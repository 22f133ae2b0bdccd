//! Process-wide session registry.
//!
//! Sessions are keyed by the caller-supplied id and created on first
//! reference. Each session sits behind its own mutex so concurrent
//! turns for the same guest serialize (keeping the draft consistent)
//! while different guests proceed independently. Expiry belongs to the
//! hosting store's retention policy; `prune_older_than` is the hook it
//! uses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use innkeep_core::ConversationSession;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<ConversationSession>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationSession::new(session_id.to_string())))
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle since before the cutoff; returns how many went.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut pruned = 0;
        let ids: Vec<String> = sessions.keys().cloned().collect();
        for id in ids {
            let stale = match sessions.get(&id) {
                Some(session) => match session.try_lock() {
                    Ok(session) => session.last_active < cutoff,
                    // A locked session is in the middle of a turn; it is
                    // certainly not stale.
                    Err(_) => false,
                },
                None => false,
            };
            if stale {
                sessions.remove(&id);
                pruned += 1;
            }
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::SessionRegistry;

    #[tokio::test]
    async fn sessions_are_created_on_first_reference() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        let session = registry.get_or_create("guest-1").await;
        assert_eq!(session.lock().await.session_id, "guest-1");
        assert_eq!(registry.len().await, 1);

        let again = registry.get_or_create("guest-1").await;
        assert!(std::sync::Arc::ptr_eq(&session, &again));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_for_different_guests_are_independent() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_create("guest-1").await;
        let second = registry.get_or_create("guest-2").await;
        assert!(!std::sync::Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn prune_drops_only_stale_sessions() {
        let registry = SessionRegistry::new();
        let stale = registry.get_or_create("stale").await;
        stale.lock().await.last_active = Utc::now() - Duration::hours(72);
        registry.get_or_create("fresh").await;

        let pruned = registry.prune_older_than(Utc::now() - Duration::hours(48)).await;
        assert_eq!(pruned, 1);
        assert_eq!(registry.len().await, 1);
    }
}
