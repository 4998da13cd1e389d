//! Test fixtures and fakes

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    CartItem, DEFAULT_LOW_STOCK_THRESHOLD, Order, OrderStatus, OrderUser, Product, User, UserRole,
};

use crate::db::memory::MemoryStore;
use crate::db::{Condition, Document, Store, StoreError, Table, Update};
use crate::email::{Email, MailError, Mailer, Template};
use crate::shipping::{Label, LabelRequest, ShippingError, ShippingProvider};
use crate::stripe::{
    CreateIntent, IntentCreated, IntentDetails, IntentStatus, PaymentError, PaymentGateway,
    RefundRequest, RefundResult,
};

// ── Fixtures ──

pub fn product(id: &str, name: &str, price: f64, stock: Option<i64>) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        price,
        overview: String::new(),
        long_description: String::new(),
        stock,
        low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        in_stock: stock.is_none_or(|s| s > 0),
        best_seller: false,
        featured_product: false,
        rating: None,
        poster: None,
        image_local: None,
        size: None,
        created_at: 1,
        updated_at: 1,
    }
}

pub fn user(id: &str, email: &str, role: UserRole) -> User {
    User {
        id: id.into(),
        email: email.into(),
        name: format!("User {id}"),
        password_hash: String::new(),
        role,
        created_at: 1,
        notifications_read_at: None,
    }
}

/// Order for two copies of `p1` at 10.00
pub fn order(id: &str, user_id: &str, status: OrderStatus) -> Order {
    Order {
        id: id.into(),
        user_id: user_id.into(),
        user: OrderUser {
            id: user_id.into(),
            name: format!("User {user_id}"),
            email: format!("{user_id}@codebook.dev"),
        },
        cart_list: vec![CartItem {
            product_id: "p1".into(),
            name: "Rust in Action".into(),
            price: 10.0,
            quantity: 2,
        }],
        quantity: 2,
        amount_paid: 20.0,
        status,
        payment_intent_id: None,
        payment_status: None,
        tracking_number: None,
        tracking_carrier: None,
        tracking_url: None,
        label_url: None,
        refund_amount: None,
        refund_id: None,
        refund_reason: None,
        reserved_items: None,
        created_at: shared::util::now_millis(),
        updated_at: shared::util::now_millis(),
    }
}

// ── Stores ──

/// Memory store with switchable failures
///
/// Injected write failures are `Unavailable` (not retried by `with_retry`).
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_next_writes: AtomicU32,
    failing_tables: Mutex<Vec<Table>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Every write to `table` fails until cleared
    pub fn fail_writes_to(&self, table: Table) {
        self.failing_tables.lock().push(table);
    }

    fn check_write(&self, table: Table) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_tables.lock().contains(&table) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        let consumed = self
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_read()?;
        self.inner.get(table, id).await
    }

    async fn put(
        &self,
        table: Table,
        doc: Document,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        self.check_write(table)?;
        self.inner.put(table, doc, condition).await
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        update: Update,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        self.check_write(table)?;
        self.inner.update(table, id, update, condition).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.check_write(table)?;
        self.inner.delete(table, id).await
    }

    async fn scan(
        &self,
        table: Table,
        filter: Option<Condition>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_read()?;
        self.inner.scan(table, filter).await
    }

    async fn batch_put(&self, table: Table, docs: Vec<Document>) -> Result<(), StoreError> {
        self.check_write(table)?;
        self.inner.batch_put(table, docs).await
    }
}

/// Memory store where another writer gets in first
///
/// The queued patches are applied, unconditionally, right before the next
/// conditional update of an order, simulating a concurrent transition.
#[derive(Default)]
pub struct RacingStore {
    inner: MemoryStore,
    interference: Mutex<Vec<Update>>,
}

impl RacingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interfere_with_next_order_update(&self, update: Update) {
        self.interference.lock().push(update);
    }
}

#[async_trait]
impl Store for RacingStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(table, id).await
    }

    async fn put(
        &self,
        table: Table,
        doc: Document,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        self.inner.put(table, doc, condition).await
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        update: Update,
        condition: Option<Condition>,
    ) -> Result<Document, StoreError> {
        if table == Table::Orders && condition.is_some() {
            let pending = {
                let mut queue = self.interference.lock();
                (!queue.is_empty()).then(|| queue.remove(0))
            };
            if let Some(rival) = pending {
                self.inner.update(table, id, rival, None).await?;
            }
        }
        self.inner.update(table, id, update, condition).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.inner.delete(table, id).await
    }

    async fn scan(
        &self,
        table: Table,
        filter: Option<Condition>,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.scan(table, filter).await
    }

    async fn batch_put(&self, table: Table, docs: Vec<Document>) -> Result<(), StoreError> {
        self.inner.batch_put(table, docs).await
    }
}

// ── Payment gateway ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFailure {
    Declined,
    Unavailable,
}

impl GatewayFailure {
    fn to_error(self) -> PaymentError {
        match self {
            Self::Declined => PaymentError::Declined("card_declined".into()),
            Self::Unavailable => PaymentError::Unavailable("scripted outage".into()),
        }
    }
}

#[derive(Default)]
struct GatewayScript {
    intents: HashMap<String, IntentDetails>,
    created: Vec<CreateIntent>,
    refunds: Vec<(String, RefundRequest)>,
    refund_failure: Option<GatewayFailure>,
}

/// Payment gateway answering from a script and recording every call
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<GatewayScript>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intent(self, intent_id: &str, status: IntentStatus, amount: i64) -> Self {
        self.script.lock().intents.insert(
            intent_id.to_string(),
            IntentDetails {
                status,
                amount,
                currency: "usd".into(),
            },
        );
        self
    }

    pub fn fail_refunds(&self, failure: GatewayFailure) {
        self.script.lock().refund_failure = Some(failure);
    }

    pub fn created(&self) -> Vec<CreateIntent> {
        self.script.lock().created.clone()
    }

    pub fn refunds(&self) -> Vec<(String, RefundRequest)> {
        self.script.lock().refunds.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(&self, request: CreateIntent) -> Result<IntentCreated, PaymentError> {
        let mut script = self.script.lock();
        let intent_id = format!("pi_{}", &request.idempotency_key[..12.min(request.idempotency_key.len())]);
        script.intents.insert(
            intent_id.clone(),
            IntentDetails {
                status: IntentStatus::RequiresPaymentMethod,
                amount: request.amount_minor,
                currency: request.currency.clone(),
            },
        );
        script.created.push(request);
        Ok(IntentCreated {
            client_secret: format!("{intent_id}_secret"),
            intent_id,
            status: IntentStatus::RequiresPaymentMethod,
        })
    }

    async fn verify(&self, intent_id: &str) -> Result<IntentDetails, PaymentError> {
        self.script
            .lock()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(intent_id.to_string()))
    }

    async fn refund(
        &self,
        intent_id: &str,
        request: RefundRequest,
    ) -> Result<RefundResult, PaymentError> {
        let mut script = self.script.lock();
        if let Some(failure) = script.refund_failure {
            return Err(failure.to_error());
        }
        let amount_refunded = match request.amount {
            Some(a) => a,
            None => script
                .intents
                .get(intent_id)
                .map(|d| d.amount)
                .unwrap_or_default(),
        };
        script.refunds.push((intent_id.to_string(), request));
        Ok(RefundResult {
            refund_id: format!("r{}", script.refunds.len()),
            amount_refunded,
            status: "succeeded".into(),
        })
    }
}

// ── Mail ──

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }

    pub fn count(&self, template: Template) -> usize {
        self.sent.lock().iter().filter(|e| e.template == template).count()
    }

    pub fn templates(&self) -> Vec<Template> {
        self.sent.lock().iter().map(|e| e.template).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Send("recording mailer set to fail".into()));
        }
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

// ── Shipping ──

#[derive(Default)]
pub struct StubShipping {
    requests: Mutex<Vec<LabelRequest>>,
    unavailable: AtomicBool,
}

impl StubShipping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<LabelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ShippingProvider for StubShipping {
    async fn create_label(&self, request: LabelRequest) -> Result<Label, ShippingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ShippingError::Unavailable("stub offline".into()));
        }
        let carrier = request.carrier.clone().unwrap_or_else(|| "USPS".into());
        self.requests.lock().push(request);
        Ok(Label {
            tracking_number: "9400TEST".into(),
            tracking_url: Some("https://tracking.example/9400TEST".into()),
            label_url: "https://labels.example/9400TEST.pdf".into(),
            carrier,
        })
    }
}
