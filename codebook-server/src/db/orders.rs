//! Orders table
//!
//! Per-user listings are scans filtered on `user_id`; a by-user index would
//! replace them.

use super::{Condition, Store, StoreError, Table, Update, from_document, to_document, with_retry};
use shared::models::{Order, OrderStatus};

pub async fn get(store: &dyn Store, id: &str) -> Result<Option<Order>, StoreError> {
    with_retry("orders.get", || store.get(Table::Orders, id))
        .await?
        .map(from_document)
        .transpose()
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

async fn scan(store: &dyn Store, filter: Option<Condition>) -> Result<Vec<Order>, StoreError> {
    let docs = with_retry("orders.scan", || store.scan(Table::Orders, filter.clone())).await?;
    let mut orders = docs
        .into_iter()
        .map(from_document::<Order>)
        .collect::<Result<Vec<_>, _>>()?;
    sort_newest_first(&mut orders);
    Ok(orders)
}

pub async fn list_for_user(store: &dyn Store, user_id: &str) -> Result<Vec<Order>, StoreError> {
    scan(store, Some(Condition::equals("user_id", user_id))).await
}

pub async fn list_all(
    store: &dyn Store,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, StoreError> {
    scan(store, status.map(|s| Condition::equals("status", s.as_str()))).await
}

/// Orders carrying the given payment intent (at most one per user)
pub async fn find_by_intent(
    store: &dyn Store,
    payment_intent_id: &str,
) -> Result<Vec<Order>, StoreError> {
    scan(
        store,
        Some(Condition::equals("payment_intent_id", payment_intent_id)),
    )
    .await
}

pub async fn find_by_user_and_intent(
    store: &dyn Store,
    user_id: &str,
    payment_intent_id: &str,
) -> Result<Option<Order>, StoreError> {
    let filter = Condition::All(vec![
        Condition::equals("user_id", user_id),
        Condition::equals("payment_intent_id", payment_intent_id),
    ]);
    Ok(scan(store, Some(filter)).await?.into_iter().next())
}

/// Orders updated strictly after `since` (all users when `user_id` is `None`)
pub async fn updated_since(
    store: &dyn Store,
    user_id: Option<&str>,
    since: i64,
) -> Result<Vec<Order>, StoreError> {
    let mut parts = vec![Condition::at_least("updated_at", since.saturating_add(1))];
    if let Some(uid) = user_id {
        parts.push(Condition::equals("user_id", uid));
    }
    scan(store, Some(Condition::All(parts))).await
}

/// Orders placed strictly after `since`, across all users
pub async fn created_since(store: &dyn Store, since: i64) -> Result<Vec<Order>, StoreError> {
    scan(
        store,
        Some(Condition::at_least("created_at", since.saturating_add(1))),
    )
    .await
}

/// Insert a new order; `Conflict` when the id is already taken
pub async fn insert(store: &dyn Store, order: &Order) -> Result<(), StoreError> {
    let doc = to_document(order)?;
    with_retry("orders.insert", || {
        store.put(Table::Orders, doc.clone(), Some(Condition::absent("id")))
    })
    .await
}

/// Update guarded on the current status; `Conflict` when another writer moved it
pub async fn update_if_status(
    store: &dyn Store,
    id: &str,
    expected: OrderStatus,
    update: Update,
) -> Result<Order, StoreError> {
    update_where(
        store,
        id,
        update,
        Condition::equals("status", expected.as_str()),
    )
    .await
}

pub async fn update_where(
    store: &dyn Store,
    id: &str,
    update: Update,
    condition: Condition,
) -> Result<Order, StoreError> {
    let doc = with_retry("orders.update", || {
        store.update(Table::Orders, id, update.clone(), Some(condition.clone()))
    })
    .await?;
    from_document(doc)
}
