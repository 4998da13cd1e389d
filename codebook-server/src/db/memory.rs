//! In-process store for local development and tests
//!
//! Same condition semantics as the DynamoDB backend. The lock is only held
//! inside synchronous sections, never across an `.await`.

use super::{Condition, Document, Store, StoreError, Table, Update};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Document) -> Result<String, StoreError> {
    doc.get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| StoreError::Serialization("record has no string id".into()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.get(&table).and_then(|t| t.get(id)).cloned())
    }

    async fn put(
        &self,
        table: Table,
        doc: Document,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let id = doc_id(&doc)?;
        let mut tables = self.tables.lock();
        let records = tables.entry(table).or_default();
        if let Some(cond) = condition
            && !cond.matches(records.get(&id))
        {
            return Err(StoreError::Conflict);
        }
        records.insert(id, doc);
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        update: Update,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        let mut tables = self.tables.lock();
        let Some(current) = tables.get_mut(&table).and_then(|t| t.get_mut(id)) else {
            return Err(StoreError::NotFound);
        };
        if let Some(cond) = condition
            && !cond.matches(Some(current))
        {
            return Err(StoreError::Conflict);
        }
        let mut next = current.clone();
        update.apply(&mut next)?;
        *current = next.clone();
        Ok(next)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some(records) = tables.get_mut(&table) {
            records.remove(id);
        }
        Ok(())
    }

    async fn scan(
        &self,
        table: Table,
        filter: Option<Condition>,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.lock();
        let Some(records) = tables.get(&table) else {
            return Ok(Vec::new());
        };
        Ok(records
            .values()
            .filter(|doc| filter.as_ref().is_none_or(|f| f.matches(Some(doc))))
            .cloned()
            .collect())
    }

    async fn batch_put(&self, table: Table, docs: Vec<Document>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let records = tables.entry(table).or_default();
        for doc in docs {
            let id = doc_id(&doc)?;
            records.insert(id, doc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryStore::new();
        let cond = Some(Condition::absent("id"));

        store
            .put(Table::Orders, doc(json!({"id": "o1", "n": 1})), cond.clone())
            .await
            .unwrap();
        let err = store
            .put(Table::Orders, doc(json!({"id": "o1", "n": 2})), cond)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict));
        let stored = store.get(Table::Orders, "o1").await.unwrap().unwrap();
        assert_eq!(stored["n"], 1);
    }

    #[tokio::test]
    async fn test_conditional_decrement() {
        let store = MemoryStore::new();
        store
            .put(Table::Products, doc(json!({"id": "p1", "stock": 2})), None)
            .await
            .unwrap();
        let guard = Condition::All(vec![
            Condition::present("stock"),
            Condition::at_least("stock", 2),
        ]);

        let updated = store
            .update(
                Table::Products,
                "p1",
                Update::new().add("stock", -2),
                Some(guard.clone()),
            )
            .await
            .unwrap();
        assert_eq!(updated["stock"], 0);

        let err = store
            .update(Table::Products, "p1", Update::new().add("stock", -2), Some(guard))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(Table::Users, "nobody", Update::new().set("name", "x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_scan_filter_and_idempotent_delete() {
        let store = MemoryStore::new();
        store
            .batch_put(
                Table::Orders,
                vec![
                    doc(json!({"id": "o1", "user_id": "u1"})),
                    doc(json!({"id": "o2", "user_id": "u2"})),
                    doc(json!({"id": "o3", "user_id": "u1"})),
                ],
            )
            .await
            .unwrap();

        let mine = store
            .scan(Table::Orders, Some(Condition::equals("user_id", "u1")))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        store.delete(Table::Orders, "o1").await.unwrap();
        store.delete(Table::Orders, "o1").await.unwrap();
        assert_eq!(store.scan(Table::Orders, None).await.unwrap().len(), 2);
    }
}
