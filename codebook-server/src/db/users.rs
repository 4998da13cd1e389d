//! Users table
//!
//! Email lookups are scans; a unique index on `email` would replace them.

use super::{Condition, Store, StoreError, Table, Update, from_document, to_document, with_retry};
use shared::models::User;

pub async fn get(store: &dyn Store, id: &str) -> Result<Option<User>, StoreError> {
    with_retry("users.get", || store.get(Table::Users, id))
        .await?
        .map(from_document)
        .transpose()
}

/// Look up by (already normalized) email
pub async fn find_by_email(store: &dyn Store, email: &str) -> Result<Option<User>, StoreError> {
    let docs = with_retry("users.find_by_email", || {
        store.scan(Table::Users, Some(Condition::equals("email", email)))
    })
    .await?;
    docs.into_iter().next().map(from_document).transpose()
}

pub async fn list(store: &dyn Store) -> Result<Vec<User>, StoreError> {
    let docs = with_retry("users.scan", || store.scan(Table::Users, None)).await?;
    let mut users = docs
        .into_iter()
        .map(from_document::<User>)
        .collect::<Result<Vec<_>, _>>()?;
    users.sort_by_key(|u| u.created_at);
    Ok(users)
}

pub async fn create(store: &dyn Store, user: &User) -> Result<(), StoreError> {
    let doc = to_document(user)?;
    with_retry("users.create", || {
        store.put(Table::Users, doc.clone(), Some(Condition::absent("id")))
    })
    .await
}

pub async fn update(
    store: &dyn Store,
    id: &str,
    update: Update,
    condition: Option<Condition>,
) -> Result<User, StoreError> {
    let doc = with_retry("users.update", || {
        store.update(Table::Users, id, update.clone(), condition.clone())
    })
    .await?;
    from_document(doc)
}

pub async fn delete(store: &dyn Store, id: &str) -> Result<(), StoreError> {
    with_retry("users.delete", || store.delete(Table::Users, id)).await
}

/// Move `notifications_read_at` forward to `now`; never moves it back.
///
/// Returns the stored value after the call.
pub async fn mark_notifications_read(
    store: &dyn Store,
    id: &str,
    now: i64,
) -> Result<i64, StoreError> {
    let guard = Condition::Any(vec![
        Condition::absent("notifications_read_at"),
        Condition::at_most("notifications_read_at", now),
    ]);
    match update(
        store,
        id,
        Update::new().set("notifications_read_at", now),
        Some(guard),
    )
    .await
    {
        Ok(user) => Ok(user.notifications_read_at.unwrap_or(now)),
        Err(StoreError::Conflict) => {
            // A later timestamp is already stored
            let current = get(store, id).await?.ok_or(StoreError::NotFound)?;
            Ok(current.notifications_read_at.unwrap_or(now))
        }
        Err(e) => Err(e),
    }
}
