//! DynamoDB backend
//!
//! Tables are named `<prefix><table>` with hash key `id`. Conditions and
//! updates are rendered to expressions with `#n`/`:v` placeholders.

use super::{BATCH_SIZE, Condition, Document, Store, StoreError, Table, Update};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeValue, PutRequest, ReturnValue, ReturnValuesOnConditionCheckFailure, WriteRequest,
};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::time::Duration;

type Item = HashMap<String, AttributeValue>;

const UNPROCESSED_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    prefix: String,
}

impl DynamoStore {
    pub fn new(client: Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn table_name(&self, table: Table) -> String {
        format!("{}{}", self.prefix, table.name())
    }
}

fn key(id: &str) -> Item {
    HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))])
}

// ── JSON ↔ AttributeValue ──

pub(crate) fn to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attr(v)))
                .collect(),
        ),
    }
}

fn parse_number(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = n.parse::<u64>() {
        return Value::from(u);
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn from_attr(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attr).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attr(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(items.iter().map(|n| parse_number(n)).collect()),
        // Binary attributes are never written by this service
        _ => Value::Null,
    }
}

fn to_item(doc: &Document) -> Item {
    doc.iter().map(|(k, v)| (k.clone(), to_attr(v))).collect()
}

fn from_item(item: &Item) -> Document {
    item.iter().map(|(k, v)| (k.clone(), from_attr(v))).collect()
}

// ── Expressions ──

#[derive(Default)]
struct Expr {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Expr {
    fn name(&mut self, attr: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, a)| a.as_str() == attr) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attr.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn condition(&mut self, cond: &Condition) -> String {
        match cond {
            Condition::Absent(a) => format!("attribute_not_exists({})", self.name(a)),
            Condition::Present(a) => format!("attribute_exists({})", self.name(a)),
            Condition::Equals(a, v) => {
                let n = self.name(a);
                format!("{n} = {}", self.value(to_attr(v)))
            }
            Condition::AtLeast(a, x) => {
                let n = self.name(a);
                format!("{n} >= {}", self.value(AttributeValue::N(x.to_string())))
            }
            Condition::AtMost(a, x) => {
                let n = self.name(a);
                format!("{n} <= {}", self.value(AttributeValue::N(x.to_string())))
            }
            Condition::All(cs) => self.join(cs, " AND "),
            Condition::Any(cs) => self.join(cs, " OR "),
        }
    }

    fn join(&mut self, conds: &[Condition], op: &str) -> String {
        let parts: Vec<String> = conds
            .iter()
            .map(|c| format!("({})", self.condition(c)))
            .collect();
        parts.join(op)
    }

    fn update(&mut self, update: &Update) -> String {
        let mut clauses = Vec::new();
        if !update.set.is_empty() {
            let sets: Vec<String> = update
                .set
                .iter()
                .map(|(a, v)| {
                    let n = self.name(a);
                    format!("{n} = {}", self.value(to_attr(v)))
                })
                .collect();
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        if !update.remove.is_empty() {
            let removes: Vec<String> = update.remove.iter().map(|a| self.name(a)).collect();
            clauses.push(format!("REMOVE {}", removes.join(", ")));
        }
        if !update.add.is_empty() {
            let adds: Vec<String> = update
                .add
                .iter()
                .map(|(a, d)| {
                    let n = self.name(a);
                    format!("{n} {}", self.value(AttributeValue::N(d.to_string())))
                })
                .collect();
            clauses.push(format!("ADD {}", adds.join(", ")));
        }
        clauses.join(" ")
    }

    /// DynamoDB rejects empty placeholder maps
    fn names_opt(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    fn values_opt(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

// ── Error classification ──

fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    match (&err, code.as_deref()) {
        (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_), _) => {
            StoreError::Unavailable(message)
        }
        (_, Some("ConditionalCheckFailedException")) => StoreError::Conflict,
        (
            _,
            Some(
                "ProvisionedThroughputExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded"
                | "TransactionConflictException",
            ),
        ) => StoreError::Throttled(message),
        (_, Some("ValidationException" | "SerializationException")) => {
            StoreError::Serialization(message)
        }
        _ => StoreError::Unavailable(message),
    }
}

#[async_trait]
impl Store for DynamoStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Document>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(self.table_name(table))
            .set_key(Some(key(id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(classify)?;
        Ok(output.item().map(from_item))
    }

    async fn put(
        &self,
        table: Table,
        doc: Document,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let mut expr = Expr::default();
        let condition = condition.map(|c| expr.condition(&c));
        self.client
            .put_item()
            .table_name(self.table_name(table))
            .set_item(Some(to_item(&doc)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(expr.names_opt())
            .set_expression_attribute_values(expr.values_opt())
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        update: Update,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        let mut expr = Expr::default();
        let update_expression = expr.update(&update);
        // The record must exist; the old image tells NotFound from Conflict.
        let guard = match condition {
            Some(c) => Condition::All(vec![Condition::present("id"), c]),
            None => Condition::present("id"),
        };
        let condition_expression = expr.condition(&guard);

        let result = self
            .client
            .update_item()
            .table_name(self.table_name(table))
            .set_key(Some(key(id)))
            .update_expression(update_expression)
            .condition_expression(condition_expression)
            .set_expression_attribute_names(expr.names_opt())
            .set_expression_attribute_values(expr.values_opt())
            .return_values(ReturnValue::AllNew)
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.attributes().map(from_item).unwrap_or_default()),
            Err(err) => {
                if let Some(UpdateItemError::ConditionalCheckFailedException(e)) =
                    err.as_service_error()
                {
                    return Err(if e.item().is_some() {
                        StoreError::Conflict
                    } else {
                        StoreError::NotFound
                    });
                }
                Err(classify(err))
            }
        }
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(self.table_name(table))
            .set_key(Some(key(id)))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn scan(
        &self,
        table: Table,
        filter: Option<Condition>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut expr = Expr::default();
        let filter = filter.map(|f| expr.condition(&f));
        let mut docs = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(self.table_name(table))
                .set_filter_expression(filter.clone())
                .set_expression_attribute_names(expr.names_opt())
                .set_expression_attribute_values(expr.values_opt())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(classify)?;

            docs.extend(output.items().iter().map(from_item));
            match output.last_evaluated_key() {
                Some(k) if !k.is_empty() => start_key = Some(k.clone()),
                _ => break,
            }
        }
        Ok(docs)
    }

    async fn batch_put(&self, table: Table, docs: Vec<Document>) -> Result<(), StoreError> {
        let table_name = self.table_name(table);

        for chunk in docs.chunks(BATCH_SIZE) {
            let mut requests = Vec::with_capacity(chunk.len());
            for doc in chunk {
                let put = PutRequest::builder()
                    .set_item(Some(to_item(doc)))
                    .build()
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                requests.push(WriteRequest::builder().put_request(put).build());
            }

            let mut pending = HashMap::from([(table_name.clone(), requests)]);
            let mut delay = Duration::from_millis(50);
            let mut attempt = 0;
            loop {
                let output = self
                    .client
                    .batch_write_item()
                    .set_request_items(Some(pending))
                    .send()
                    .await
                    .map_err(classify)?;

                match output.unprocessed_items() {
                    Some(left) if left.values().any(|v| !v.is_empty()) => {
                        attempt += 1;
                        if attempt > UNPROCESSED_RETRIES {
                            return Err(StoreError::Throttled(format!(
                                "{} items left unprocessed in {table_name}",
                                left.values().map(Vec::len).sum::<usize>()
                            )));
                        }
                        tracing::warn!(table = %table_name, attempt, "Retrying unprocessed batch items");
                        pending = left.clone();
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    _ => break,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attr_conversion_keeps_shape() {
        let value = json!({
            "id": "o1",
            "amount_paid": 20.5,
            "quantity": 2,
            "cart_list": [{"product_id": "p1", "quantity": 2}],
            "tracking_number": null,
            "featured_product": 1,
            "ok": true
        });
        let back = from_attr(&to_attr(&value));
        assert_eq!(back, value);
    }

    #[test]
    fn test_condition_expression() {
        let mut expr = Expr::default();
        let rendered = expr.condition(&Condition::All(vec![
            Condition::present("stock"),
            Condition::at_least("stock", 2),
        ]));
        assert_eq!(
            rendered,
            "(attribute_exists(#n0)) AND (#n0 >= :v0)"
        );
        assert_eq!(expr.names.get("#n0").unwrap(), "stock");
        assert_eq!(expr.values.get(":v0").unwrap(), &AttributeValue::N("2".into()));
    }

    #[test]
    fn test_update_expression() {
        let mut expr = Expr::default();
        let rendered = expr.update(
            &Update::new()
                .set("status", "shipped")
                .remove("label_url")
                .add("stock", -1),
        );
        assert_eq!(rendered, "SET #n0 = :v0 REMOVE #n1 ADD #n2 :v1");
        assert!(expr.names_opt().is_some());
    }

    #[test]
    fn test_empty_expression_maps_are_omitted() {
        let expr = Expr::default();
        assert!(expr.names_opt().is_none());
        assert!(expr.values_opt().is_none());
    }
}
