//! Products table

use super::{Condition, Store, StoreError, Table, Update, from_document, to_document, with_retry};
use shared::models::Product;

pub async fn get(store: &dyn Store, id: &str) -> Result<Option<Product>, StoreError> {
    with_retry("products.get", || store.get(Table::Products, id))
        .await?
        .map(from_document)
        .transpose()
}

/// All products, optionally filtered by a case-insensitive name substring
pub async fn list(store: &dyn Store, name_like: Option<&str>) -> Result<Vec<Product>, StoreError> {
    let docs = with_retry("products.scan", || store.scan(Table::Products, None)).await?;
    let needle = name_like.map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty());
    let mut products = docs
        .into_iter()
        .map(from_document::<Product>)
        .filter(|p| match (p, &needle) {
            (Ok(p), Some(n)) => p.name.to_lowercase().contains(n.as_str()),
            _ => true,
        })
        .collect::<Result<Vec<_>, _>>()?;
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
}

pub async fn featured(store: &dyn Store) -> Result<Vec<Product>, StoreError> {
    let docs = with_retry("products.featured", || {
        store.scan(Table::Products, Some(featured_filter()))
    })
    .await?;
    docs.into_iter().map(from_document).collect()
}

/// Stored as 1 by current writers, `true` by older ones
fn featured_filter() -> Condition {
    Condition::Any(vec![
        Condition::equals("featured_product", 1),
        Condition::equals("featured_product", true),
    ])
}

pub async fn create(store: &dyn Store, product: &Product) -> Result<(), StoreError> {
    let doc = to_document(product)?;
    with_retry("products.create", || {
        store.put(Table::Products, doc.clone(), Some(Condition::absent("id")))
    })
    .await
}

pub async fn update(
    store: &dyn Store,
    id: &str,
    update: Update,
    condition: Option<Condition>,
) -> Result<Product, StoreError> {
    let doc = with_retry("products.update", || {
        store.update(Table::Products, id, update.clone(), condition.clone())
    })
    .await?;
    from_document(doc)
}

pub async fn delete(store: &dyn Store, id: &str) -> Result<(), StoreError> {
    with_retry("products.delete", || store.delete(Table::Products, id)).await
}
