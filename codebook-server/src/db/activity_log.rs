//! Activity log table

use super::{Condition, Store, StoreError, Table, from_document, to_document, with_retry};
use shared::models::{ActivityAction, ActivityLogEntry, EntityType};

pub async fn insert(store: &dyn Store, entry: &ActivityLogEntry) -> Result<(), StoreError> {
    let doc = to_document(entry)?;
    with_retry("activity_log.insert", || {
        store.put(Table::ActivityLog, doc.clone(), Some(Condition::absent("id")))
    })
    .await
}

/// Newest first, at most `limit` entries
pub async fn query(
    store: &dyn Store,
    entity_type: Option<EntityType>,
    action: Option<ActivityAction>,
    limit: usize,
) -> Result<Vec<ActivityLogEntry>, StoreError> {
    let mut parts = Vec::new();
    if let Some(t) = entity_type {
        parts.push(Condition::equals("entity_type", t.as_str()));
    }
    if let Some(a) = action {
        parts.push(Condition::equals("action", a.as_str()));
    }
    let filter = (!parts.is_empty()).then_some(Condition::All(parts));

    let docs = with_retry("activity_log.scan", || {
        store.scan(Table::ActivityLog, filter.clone())
    })
    .await?;
    let mut entries = docs
        .into_iter()
        .map(from_document::<ActivityLogEntry>)
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries.truncate(limit);
    Ok(entries)
}
