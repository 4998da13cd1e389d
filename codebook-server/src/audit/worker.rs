//! Background retry for audit entries whose inline write failed
//!
//! Consumes the mpsc channel until it closes.

use std::sync::Arc;
use std::time::Duration;

use shared::models::ActivityLogEntry;
use tokio::sync::mpsc;

use crate::db::{self, Store, StoreError};

const MAX_ATTEMPTS: u32 = 6;
const BASE_DELAY: Duration = Duration::from_millis(200);

pub struct AuditWorker {
    store: Arc<dyn Store>,
}

impl AuditWorker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run until the channel closes
    pub async fn run(self, mut rx: mpsc::Receiver<ActivityLogEntry>) {
        tracing::info!("Audit retry worker started");

        while let Some(entry) = rx.recv().await {
            self.persist(entry).await;
        }

        tracing::info!("Audit channel closed, worker stopping");
    }

    async fn persist(&self, entry: ActivityLogEntry) -> bool {
        let mut delay = BASE_DELAY;
        for attempt in 1..=MAX_ATTEMPTS {
            match db::activity_log::insert(self.store.as_ref(), &entry).await {
                // A previous attempt landed after all
                Ok(()) | Err(StoreError::Conflict) => {
                    tracing::debug!(audit_id = %entry.id, attempt, "Queued audit entry written");
                    return true;
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(audit_id = %entry.id, attempt, error = %e, "Audit retry failed");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        audit_id = %entry.id,
                        action = %entry.action,
                        entity_type = %entry.entity_type,
                        entity_id = %entry.entity_id,
                        error = %e,
                        "Audit entry lost after retries"
                    );
                }
            }
        }
        false
    }
}
