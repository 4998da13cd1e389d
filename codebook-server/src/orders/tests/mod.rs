use super::*;
use std::sync::Arc;

use shared::models::{ActivityLogEntry, CartItem, Order, UserRole};
use tokio::sync::mpsc;

use crate::audit::{AuditLog, AuditQuery};
use crate::auth::AuthContext;
use crate::db::memory::MemoryStore;
use crate::db::{self, Store};
use crate::email::Notifier;
use crate::services::StockService;
use crate::testing::{RecordingMailer, ScriptedGateway, StubShipping, product};

struct Harness {
    store: Arc<dyn Store>,
    gateway: Arc<ScriptedGateway>,
    mailer: Arc<RecordingMailer>,
    shipping: Arc<StubShipping>,
    audit: Arc<AuditLog>,
    _audit_rx: mpsc::Receiver<ActivityLogEntry>,
    service: OrderService,
}

fn harness() -> Harness {
    build(Arc::new(MemoryStore::new()), ScriptedGateway::new(), false)
}

fn build(store: Arc<dyn Store>, gateway: ScriptedGateway, require_paid: bool) -> Harness {
    let gateway = Arc::new(gateway);
    let mailer = Arc::new(RecordingMailer::new());
    let shipping = Arc::new(StubShipping::new());
    let notifier = Arc::new(Notifier::new(
        mailer.clone(),
        "ops@codebook.dev",
        "http://localhost:3000",
    ));
    let (audit, rx) = AuditLog::new(store.clone(), 16);
    let stock = Arc::new(StockService::new(store.clone(), notifier.clone()));
    let service = OrderService::new(
        store.clone(),
        stock,
        gateway.clone(),
        shipping.clone(),
        audit.clone(),
        notifier,
        require_paid,
    );
    Harness {
        store,
        gateway,
        mailer,
        shipping,
        audit,
        _audit_rx: rx,
        service,
    }
}

fn customer(id: &str) -> AuthContext {
    AuthContext {
        user_id: id.into(),
        email: format!("{id}@codebook.dev"),
        name: format!("Reader {id}"),
        role: UserRole::User,
        issued_at: 0,
        expires_at: i64::MAX,
    }
}

fn admin() -> AuthContext {
    AuthContext {
        user_id: "admin-1".into(),
        email: "admin@codebook.dev".into(),
        name: "Admin".into(),
        role: UserRole::Admin,
        issued_at: 0,
        expires_at: i64::MAX,
    }
}

fn cart(lines: &[(&str, f64, i64)]) -> CreateOrderRequest {
    let cart_list: Vec<CartItem> = lines
        .iter()
        .map(|(id, price, quantity)| CartItem {
            product_id: id.to_string(),
            name: format!("Book {id}"),
            price: *price,
            quantity: *quantity,
        })
        .collect();
    let amount_paid = lines.iter().map(|(_, p, q)| p * *q as f64).sum();
    CreateOrderRequest {
        cart_list,
        amount_paid,
        quantity: Some(lines.iter().map(|(_, _, q)| q).sum()),
        user: None,
        payment_intent_id: None,
    }
}

impl Harness {
    async fn seed(&self, id: &str, price: f64, stock: Option<i64>) {
        db::products::create(self.store.as_ref(), &product(id, &format!("Book {id}"), price, stock))
            .await
            .unwrap();
    }

    async fn stock_of(&self, id: &str) -> Option<i64> {
        db::products::get(self.store.as_ref(), id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn stored(&self, order_id: &str) -> Order {
        db::orders::get(self.store.as_ref(), order_id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn orders(&self) -> Vec<Order> {
        db::orders::list_all(self.store.as_ref(), None).await.unwrap()
    }

    async fn audit_entries(&self) -> Vec<ActivityLogEntry> {
        self.audit.query(AuditQuery::default()).await.unwrap()
    }

    /// S1 setup: p1 at 10.00 with five copies, u1 orders two
    async fn place_order(&self) -> Order {
        self.seed("p1", 10.0, Some(5)).await;
        self.service
            .create_order(&customer("u1"), cart(&[("p1", 10.0, 2)]))
            .await
            .unwrap()
            .order
    }

    async fn place_paid_order(&self, intent_id: &str) -> Order {
        self.seed("p1", 10.0, Some(5)).await;
        let mut req = cart(&[("p1", 10.0, 2)]);
        req.payment_intent_id = Some(intent_id.into());
        self.service
            .create_order(&customer("u1"), req)
            .await
            .unwrap()
            .order
    }
}

mod test_create;
