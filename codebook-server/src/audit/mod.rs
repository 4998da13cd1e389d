//! Append-only audit log of privileged mutations
//!
//! `record` never fails from the caller's view. The entry is written inline
//! (with the store's bounded retry); if that still fails it is handed to
//! [`worker::AuditWorker`] over an mpsc channel, which keeps retrying with
//! back-off.

pub mod worker;

use std::sync::Arc;

use serde_json::{Map, Value};
use shared::models::{ActivityAction, ActivityLogEntry, EntityType};
use tokio::sync::mpsc;

use crate::auth::AuthContext;
use crate::db::{self, Store, StoreError};

pub use worker::AuditWorker;

/// Default and maximum page sizes for `query`
pub const DEFAULT_QUERY_LIMIT: usize = 100;
pub const MAX_QUERY_LIMIT: usize = 500;

/// Who performed a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

impl Actor {
    /// Actor for processor callbacks and other unattended writes
    pub fn system() -> Self {
        Self {
            user_id: "system".into(),
            email: "system".into(),
            name: "System".into(),
        }
    }
}

impl From<&AuthContext> for Actor {
    fn from(ctx: &AuthContext) -> Self {
        Self {
            user_id: ctx.user_id.clone(),
            email: ctx.email.clone(),
            name: ctx.name.clone(),
        }
    }
}

/// Filter for the admin activity view
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub entity_type: Option<EntityType>,
    pub action: Option<ActivityAction>,
    pub limit: Option<usize>,
}

pub struct AuditLog {
    store: Arc<dyn Store>,
    tx: mpsc::Sender<ActivityLogEntry>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Create the log and the receiving end for its retry worker
    pub fn new(
        store: Arc<dyn Store>,
        buffer_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<ActivityLogEntry>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Arc::new(Self { store, tx }), rx)
    }

    /// Create the log and spawn its retry worker on the current runtime
    pub fn spawn(store: Arc<dyn Store>, buffer_size: usize) -> Arc<Self> {
        let (log, rx) = Self::new(store.clone(), buffer_size);
        tokio::spawn(AuditWorker::new(store).run(rx));
        log
    }

    pub async fn record(
        &self,
        actor: &Actor,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: &str,
        details: Value,
    ) {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        let entry = ActivityLogEntry {
            id: shared::util::new_id(),
            created_at: shared::util::now_millis(),
            actor_user_id: actor.user_id.clone(),
            actor_email: actor.email.clone(),
            actor_name: actor.name.clone(),
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            details,
        };

        match db::activity_log::insert(self.store.as_ref(), &entry).await {
            Ok(()) => {
                tracing::debug!(
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    "Audit entry recorded"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, entity_id = %entry.entity_id, "Audit write failed, queueing for retry");
                if let Err(e) = self.tx.try_send(entry) {
                    tracing::error!(error = %e, "Audit retry queue unavailable, entry dropped");
                }
            }
        }
    }

    pub async fn query(&self, query: AuditQuery) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);
        db::activity_log::query(self.store.as_ref(), query.entity_type, query.action, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::testing::FlakyStore;
    use serde_json::json;

    fn admin() -> Actor {
        Actor {
            user_id: "admin-1".into(),
            email: "admin@codebook.dev".into(),
            name: "Admin".into(),
        }
    }

    #[tokio::test]
    async fn test_record_and_query_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let (log, _rx) = AuditLog::new(store, 8);

        log.record(
            &admin(),
            ActivityAction::Create,
            EntityType::Product,
            "p1",
            json!({"name": "Book"}),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        log.record(
            &admin(),
            ActivityAction::StatusChange,
            EntityType::Order,
            "o1",
            json!({"previous_status": "pending", "new_status": "processing"}),
        )
        .await;

        let all = log.query(AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity_id, "o1");

        let orders = log
            .query(AuditQuery {
                entity_type: Some(EntityType::Order),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].details["new_status"], "processing");
    }

    #[tokio::test]
    async fn test_failed_write_is_queued() {
        let store = Arc::new(FlakyStore::new());
        store.fail_writes(true);
        let (log, mut rx) = AuditLog::new(store, 8);

        log.record(
            &admin(),
            ActivityAction::Delete,
            EntityType::User,
            "u9",
            Value::Null,
        )
        .await;

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.entity_id, "u9");
        assert_eq!(queued.action, ActivityAction::Delete);
    }

    #[tokio::test]
    async fn test_query_limit_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        let (log, _rx) = AuditLog::new(store, 8);
        for i in 0..3 {
            log.record(
                &admin(),
                ActivityAction::Update,
                EntityType::Product,
                &format!("p{i}"),
                json!({}),
            )
            .await;
        }

        let page = log
            .query(AuditQuery {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
