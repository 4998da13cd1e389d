//! Document store access layer
//!
//! Four logical tables keyed by `id`, no secondary indexes. Backends
//! implement [`Store`]; the per-table modules wrap it with typed helpers.

pub mod activity_log;
pub mod dynamo;
pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Stored record: a JSON object with a string `id`
pub type Document = Map<String, Value>;

/// Logical tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Products,
    Users,
    Orders,
    ActivityLog,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Products,
        Table::Users,
        Table::Orders,
        Table::ActivityLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Users => "users",
            Self::Orders => "orders",
            Self::ActivityLog => "activity_log",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("write condition failed")]
    Conflict,
    #[error("store throttled: {0}")]
    Throttled(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Worth retrying after a back-off
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Write condition / scan filter
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Absent(String),
    Present(String),
    Equals(String, Value),
    AtLeast(String, i64),
    AtMost(String, i64),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn absent(attr: &str) -> Self {
        Self::Absent(attr.to_string())
    }

    pub fn present(attr: &str) -> Self {
        Self::Present(attr.to_string())
    }

    pub fn equals(attr: &str, value: impl Into<Value>) -> Self {
        Self::Equals(attr.to_string(), value.into())
    }

    pub fn at_least(attr: &str, n: i64) -> Self {
        Self::AtLeast(attr.to_string(), n)
    }

    pub fn at_most(attr: &str, n: i64) -> Self {
        Self::AtMost(attr.to_string(), n)
    }

    /// Evaluate against a record; `None` is a record that does not exist.
    pub fn matches(&self, doc: Option<&Document>) -> bool {
        let field = |attr: &str| doc.and_then(|d| d.get(attr)).filter(|v| !v.is_null());
        match self {
            Self::Absent(a) => field(a).is_none(),
            Self::Present(a) => field(a).is_some(),
            Self::Equals(a, expected) => field(a).is_some_and(|v| values_equal(v, expected)),
            Self::AtLeast(a, n) => field(a)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *n as f64),
            Self::AtMost(a, n) => field(a)
                .and_then(Value::as_f64)
                .is_some_and(|v| v <= *n as f64),
            Self::All(cs) => cs.iter().all(|c| c.matches(doc)),
            Self::Any(cs) => cs.iter().any(|c| c.matches(doc)),
        }
    }
}

/// Numbers compare by value so `5` equals `5.0`
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Partial update: set / remove / atomic add. Unmentioned fields are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Vec<(String, Value)>,
    pub remove: Vec<String>,
    pub add: Vec<(String, i64)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.set.push((attr.to_string(), value.into()));
        self
    }

    /// `set` when `Some`, `remove` when `None`
    pub fn set_opt<V: Into<Value>>(self, attr: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(attr, v),
            None => self.remove(attr),
        }
    }

    pub fn remove(mut self, attr: &str) -> Self {
        self.remove.push(attr.to_string());
        self
    }

    pub fn add(mut self, attr: &str, delta: i64) -> Self {
        self.add.push((attr.to_string(), delta));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.add.is_empty()
    }

    /// Apply to an in-memory record (same semantics as the DynamoDB expression)
    pub fn apply(&self, doc: &mut Document) -> Result<(), StoreError> {
        for (attr, value) in &self.set {
            doc.insert(attr.clone(), value.clone());
        }
        for attr in &self.remove {
            doc.remove(attr);
        }
        for (attr, delta) in &self.add {
            let current = match doc.get(attr) {
                None | Some(Value::Null) => 0,
                Some(v) => v.as_i64().ok_or_else(|| {
                    StoreError::Serialization(format!("cannot add to non-integer attribute {attr}"))
                })?,
            };
            doc.insert(attr.clone(), Value::from(current + delta));
        }
        Ok(())
    }
}

/// Document persistence
///
/// `update` returns the record as written; a missing record is `NotFound`,
/// a failed condition is `Conflict`. `delete` is idempotent.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Document>, StoreError>;

    async fn put(
        &self,
        table: Table,
        doc: Document,
        condition: Option<Condition>,
    ) -> Result<(), StoreError>;

    async fn update(
        &self,
        table: Table,
        id: &str,
        update: Update,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError>;

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError>;

    /// Full-table scan; admin views and low-volume lookups only
    async fn scan(&self, table: Table, filter: Option<Condition>)
    -> Result<Vec<Document>, StoreError>;

    async fn batch_put(&self, table: Table, docs: Vec<Document>) -> Result<(), StoreError>;
}

/// Maximum items per batch write request
pub const BATCH_SIZE: usize = 25;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Up to half of `delay` again, so throttled callers do not retry in lockstep
fn jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let max = u64::try_from(delay.as_millis() / 2).unwrap_or(0);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}

/// Run `op`, retrying `Throttled` with exponential back-off
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                tracing::warn!(op = label, attempt, error = %e, "Store throttled, retrying");
                let pause = delay + jitter(delay);
                tokio::time::sleep(pause).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
