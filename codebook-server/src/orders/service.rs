use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use shared::models::{
    ActivityAction, EntityType, Order, OrderResponse, OrderStatus, OrderUser, PaymentStatus,
    StockRestore,
};

use super::validate::validate_cart;
use super::{
    CreateOrderRequest, LabelInput, OrderError, OrderResult, RefundInput, Tracking,
    TrackingUpdate,
};
use crate::audit::{Actor, AuditLog};
use crate::auth::AuthContext;
use crate::db::{self, Condition, Store, StoreError, Update};
use crate::email::{self, Notifier, Template};
use crate::money;
use crate::services::StockService;
use crate::shipping::{LabelRequest, ShippingProvider};
use crate::stripe::{self, IntentStatus, PaymentGateway, RefundRequest};

/// Attempts at allocating an unused order id
const ID_ATTEMPTS: usize = 3;

pub struct OrderService {
    store: Arc<dyn Store>,
    stock: Arc<StockService>,
    gateway: Arc<dyn PaymentGateway>,
    shipping: Arc<dyn ShippingProvider>,
    audit: Arc<AuditLog>,
    notifier: Arc<Notifier>,
    require_paid_orders: bool,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        stock: Arc<StockService>,
        gateway: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingProvider>,
        audit: Arc<AuditLog>,
        notifier: Arc<Notifier>,
        require_paid_orders: bool,
    ) -> Self {
        Self {
            store,
            stock,
            gateway,
            shipping,
            audit,
            notifier,
            require_paid_orders,
        }
    }

    async fn load(&self, order_id: &str) -> OrderResult<Order> {
        db::orders::get(self.store.as_ref(), order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    fn require_admin(actor: &AuthContext) -> OrderResult<()> {
        actor.require_admin().map_err(OrderError::Auth)
    }

    // ========== Creation ==========

    pub async fn create_order(
        &self,
        actor: &AuthContext,
        req: CreateOrderRequest,
    ) -> OrderResult<OrderResponse> {
        let cart = validate_cart(&req, actor)?;
        let intent_id = req
            .payment_intent_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        if let Some(pi) = &intent_id
            && let Some(existing) =
                db::orders::find_by_user_and_intent(self.store.as_ref(), &actor.user_id, pi).await?
        {
            tracing::info!(order_id = %existing.id, payment_intent_id = %pi, "Order already exists for intent");
            return Ok(OrderResponse::new(existing, Vec::new()));
        }

        let payment_status = self.check_payment(intent_id.as_deref()).await?;

        let reserved = self.stock.reserve_all(&cart.items).await?;

        let now = shared::util::now_millis();
        let mut order = Order {
            id: String::new(),
            user_id: actor.user_id.clone(),
            user: OrderUser {
                id: actor.user_id.clone(),
                name: actor.name.clone(),
                email: actor.email.clone(),
            },
            cart_list: cart.items,
            quantity: cart.quantity,
            amount_paid: cart.amount_paid,
            status: OrderStatus::Pending,
            payment_intent_id: intent_id.clone(),
            payment_status,
            tracking_number: None,
            tracking_carrier: None,
            tracking_url: None,
            label_url: None,
            refund_amount: None,
            refund_id: None,
            refund_reason: None,
            reserved_items: Some(reserved.clone()),
            created_at: now,
            updated_at: now,
        };

        let mut last_error = StoreError::Conflict;
        let mut persisted = false;
        for _ in 0..ID_ATTEMPTS {
            order.id = shared::util::new_id();
            match db::orders::insert(self.store.as_ref(), &order).await {
                Ok(()) => {
                    persisted = true;
                    break;
                }
                Err(StoreError::Conflict) => {
                    tracing::warn!(order_id = %order.id, "Order id collision, regenerating");
                }
                Err(e) => {
                    last_error = e;
                    break;
                }
            }
        }
        if !persisted {
            let outcomes = self.stock.restore_all(&reserved).await;
            tracing::error!(
                payment_intent_id = ?intent_id,
                restored = outcomes.iter().filter(|o| o.success).count(),
                "Order not persisted, reserved stock released"
            );
            return Err(OrderError::PersistFailed {
                payment_intent_id: intent_id,
                source: last_error,
            });
        }

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            amount = order.amount_paid,
            items = order.quantity,
            "Order created"
        );

        self.audit
            .record(
                &Actor::from(actor),
                ActivityAction::Create,
                EntityType::Order,
                &order.id,
                json!({
                    "amount_paid": order.amount_paid,
                    "quantity": order.quantity,
                    "item_count": order.cart_list.len(),
                    "payment_intent_id": order.payment_intent_id,
                }),
            )
            .await;

        self.notifier
            .notify_customer(Template::OrderConfirmation, &order)
            .await;
        self.notifier
            .notify_admin(Template::AdminNewOrder, &email::order_data(&order))
            .await;

        Ok(OrderResponse::new(order, Vec::new()))
    }

    /// Payment policy for a new order; returns the status to record
    async fn check_payment(&self, intent_id: Option<&str>) -> OrderResult<Option<PaymentStatus>> {
        let Some(pi) = intent_id else {
            if self.require_paid_orders {
                return Err(OrderError::NoPaymentIntent("new order".into()));
            }
            return Ok(None);
        };

        if self.require_paid_orders {
            let details = self.gateway.verify(pi).await?;
            if details.status != IntentStatus::Succeeded {
                return Err(OrderError::PaymentNotSucceeded {
                    intent_id: pi.to_string(),
                    status: PaymentStatus::from(details.status).as_str().to_string(),
                });
            }
            return Ok(Some(PaymentStatus::Succeeded));
        }

        match self.gateway.verify(pi).await {
            Ok(details) => Ok(Some(details.status.into())),
            Err(e) => {
                tracing::warn!(payment_intent_id = pi, error = %e, "Intent verification failed, order kept without payment status");
                Ok(None)
            }
        }
    }

    // ========== Transitions ==========

    /// Admin status change (everything except `refunded`)
    pub async fn update_status(
        &self,
        actor: &AuthContext,
        order_id: &str,
        new_status: OrderStatus,
        tracking: Option<Tracking>,
    ) -> OrderResult<OrderResponse> {
        Self::require_admin(actor)?;
        if new_status == OrderStatus::Refunded {
            return Err(OrderError::RefundViaStatus);
        }
        let tracking = tracking.filter(|t| !t.is_empty());

        let mut order = self.load(order_id).await?;
        let mut reloaded = false;
        let updated = loop {
            if !order.status.can_transition_to(new_status) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: new_status,
                });
            }

            let mut update = Update::new()
                .set("status", new_status.as_str())
                .set("updated_at", shared::util::now_millis());
            if let Some(t) = &tracking {
                update = with_tracking(update, t);
            }

            match db::orders::update_if_status(self.store.as_ref(), order_id, order.status, update)
                .await
            {
                Ok(o) => break o,
                Err(StoreError::Conflict) if !reloaded => {
                    tracing::info!(order_id, expected = %order.status, "Order moved concurrently, reloading");
                    reloaded = true;
                    order = self.load(order_id).await?;
                }
                Err(StoreError::Conflict) => {
                    return Err(OrderError::StatusConflict {
                        order_id: order_id.to_string(),
                        refund_id: None,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };
        let previous = order.status;

        tracing::info!(order_id, from = %previous, to = %new_status, "Order status changed");

        let mut restores = Vec::new();
        match new_status {
            OrderStatus::Cancelled => {
                restores = self.stock.restore_all(updated.reserved_lines()).await;
                self.notifier
                    .notify_customer(Template::OrderCanceled, &updated)
                    .await;
            }
            OrderStatus::Shipped => {
                self.notifier
                    .notify_customer(Template::ShippingNotification, &updated)
                    .await;
            }
            OrderStatus::Delivered => {
                self.notifier
                    .notify_customer(Template::DeliveryConfirmation, &updated)
                    .await;
            }
            _ => {}
        }

        let mut details = json!({
            "previous_status": previous.as_str(),
            "new_status": new_status.as_str(),
        });
        if let Some(t) = &tracking {
            merge(&mut details, tracking_details(t));
        }
        if !restores.is_empty() {
            merge(&mut details, json!({ "stock_restores": restores_summary(&restores) }));
        }
        self.audit
            .record(
                &Actor::from(actor),
                ActivityAction::StatusChange,
                EntityType::Order,
                order_id,
                details,
            )
            .await;

        Ok(OrderResponse::new(updated, restores))
    }

    /// Refund through the gateway, then mark the order `refunded`
    pub async fn refund(
        &self,
        actor: &AuthContext,
        order_id: &str,
        input: RefundInput,
    ) -> OrderResult<OrderResponse> {
        Self::require_admin(actor)?;

        let order = self.load(order_id).await?;
        if order.status == OrderStatus::Refunded {
            return Err(OrderError::AlreadyRefunded(order_id.to_string()));
        }
        let intent_id = order
            .payment_intent_id
            .clone()
            .filter(|pi| !pi.is_empty())
            .ok_or_else(|| OrderError::NoPaymentIntent(order_id.to_string()))?;
        if !order.status.can_transition_to(OrderStatus::Refunded) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Refunded,
            });
        }

        let amount_minor = match input.amount {
            None => None,
            Some(a) => {
                let within_paid = money::to_decimal(a)
                    .zip(money::to_decimal(order.amount_paid))
                    .is_some_and(|(requested, paid)| requested <= paid);
                match money::to_minor_units(a) {
                    Some(minor) if a.is_finite() && a > 0.0 && within_paid => Some(minor),
                    _ => {
                        return Err(OrderError::Validation(format!(
                            "refund amount must be greater than 0 and at most {}",
                            order.amount_paid
                        )));
                    }
                }
            }
        };
        let reason = input
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let refund = self
            .gateway
            .refund(
                &intent_id,
                RefundRequest {
                    amount: amount_minor,
                    reason: reason.clone(),
                    idempotency_key: stripe::refund_idempotency_key(order_id, amount_minor),
                },
            )
            .await?;

        tracing::info!(
            order_id,
            refund_id = %refund.refund_id,
            amount = refund.amount_refunded,
            "Refund issued"
        );

        let mut expected = order.status;
        let mut reloaded = false;
        let updated = loop {
            let update = Update::new()
                .set("status", OrderStatus::Refunded.as_str())
                .set("payment_status", PaymentStatus::Refunded.as_str())
                .set("refund_id", refund.refund_id.as_str())
                .set("refund_amount", refund.amount_refunded)
                .set_opt("refund_reason", reason.clone())
                .set("updated_at", shared::util::now_millis());

            match db::orders::update_if_status(self.store.as_ref(), order_id, expected, update).await
            {
                Ok(o) => break o,
                Err(StoreError::Conflict) if !reloaded => {
                    reloaded = true;
                    let current = self.load(order_id).await?;
                    if !current.status.can_transition_to(OrderStatus::Refunded) {
                        tracing::error!(
                            order_id,
                            refund_id = %refund.refund_id,
                            status = %current.status,
                            "Refund issued but order moved concurrently"
                        );
                        return Err(OrderError::StatusConflict {
                            order_id: order_id.to_string(),
                            refund_id: Some(refund.refund_id),
                        });
                    }
                    expected = current.status;
                }
                Err(StoreError::Conflict) => {
                    return Err(OrderError::StatusConflict {
                        order_id: order_id.to_string(),
                        refund_id: Some(refund.refund_id),
                    });
                }
                Err(e) => {
                    tracing::error!(order_id, refund_id = %refund.refund_id, error = %e, "Refund issued but not recorded");
                    return Err(e.into());
                }
            }
        };

        // Cancellation already put the stock back
        let restores = if expected == OrderStatus::Cancelled {
            Vec::new()
        } else {
            self.stock.restore_all(updated.reserved_lines()).await
        };

        let mut details = json!({
            "previous_status": expected.as_str(),
            "new_status": OrderStatus::Refunded.as_str(),
            "refund_id": refund.refund_id,
            "refund_amount": refund.amount_refunded,
            "partial": amount_minor.is_some(),
            "reason": reason,
        });
        if !restores.is_empty() {
            merge(&mut details, json!({ "stock_restores": restores_summary(&restores) }));
        }
        self.audit
            .record(
                &Actor::from(actor),
                ActivityAction::StatusChange,
                EntityType::Order,
                order_id,
                details,
            )
            .await;

        self.notifier
            .notify_customer(Template::OrderRefunded, &updated)
            .await;
        self.notifier
            .notify_admin(Template::AdminRefundProcessed, &email::order_data(&updated))
            .await;

        Ok(OrderResponse::new(updated, restores))
    }

    /// Record tracking; moves the order too when `status` is a valid next step
    pub async fn attach_tracking(
        &self,
        actor: &AuthContext,
        order_id: &str,
        input: TrackingUpdate,
    ) -> OrderResult<OrderResponse> {
        Self::require_admin(actor)?;
        if input.tracking_number.trim().is_empty() || input.tracking_carrier.trim().is_empty() {
            return Err(OrderError::Validation(
                "tracking_number and tracking_carrier are required".into(),
            ));
        }
        let tracking = Tracking {
            tracking_number: Some(input.tracking_number.trim().to_string()),
            tracking_carrier: Some(input.tracking_carrier.trim().to_string()),
            tracking_url: input.tracking_url,
            label_url: input.label_url,
        };

        let mut order = self.load(order_id).await?;
        if let Some(next) = input.status
            && next != order.status
            && next != OrderStatus::Refunded
            && order.status.can_transition_to(next)
        {
            return self
                .update_status(actor, order_id, next, Some(tracking))
                .await;
        }

        let mut reloaded = false;
        let updated = loop {
            let update = with_tracking(
                Update::new().set("updated_at", shared::util::now_millis()),
                &tracking,
            );
            match db::orders::update_if_status(self.store.as_ref(), order_id, order.status, update)
                .await
            {
                Ok(o) => break o,
                Err(StoreError::Conflict) if !reloaded => {
                    reloaded = true;
                    order = self.load(order_id).await?;
                }
                Err(StoreError::Conflict) => {
                    return Err(OrderError::StatusConflict {
                        order_id: order_id.to_string(),
                        refund_id: None,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(order_id, tracking_number = ?tracking.tracking_number, "Tracking attached");

        self.audit
            .record(
                &Actor::from(actor),
                ActivityAction::Update,
                EntityType::Order,
                order_id,
                tracking_details(&tracking),
            )
            .await;

        if !order.has_tracking() {
            self.notifier
                .notify_customer(Template::ShippingNotification, &updated)
                .await;
        }

        Ok(OrderResponse::new(updated, Vec::new()))
    }

    /// Buy a shipping label and record it as the order's tracking
    pub async fn generate_label(
        &self,
        actor: &AuthContext,
        order_id: &str,
        input: LabelInput,
    ) -> OrderResult<OrderResponse> {
        Self::require_admin(actor)?;
        let order = self.load(order_id).await?;
        if order.status.is_terminal() || order.status == OrderStatus::Cancelled {
            return Err(OrderError::Validation(format!(
                "cannot ship an order that is {}",
                order.status
            )));
        }

        let label = self
            .shipping
            .create_label(LabelRequest {
                address_from: input.address_from,
                address_to: input.address_to,
                parcel: input.parcel,
                carrier: input.carrier,
            })
            .await?;

        self.attach_tracking(
            actor,
            order_id,
            TrackingUpdate {
                tracking_number: label.tracking_number,
                tracking_carrier: label.carrier,
                tracking_url: label.tracking_url,
                label_url: Some(label.label_url),
                status: input.status,
            },
        )
        .await
    }

    // ========== Processor callbacks ==========

    /// Record a payment status reported by the processor on every order
    /// carrying the intent. Guarded on the previous status so a duplicate
    /// delivery changes nothing; returns the orders that were updated.
    pub async fn record_payment_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> OrderResult<Vec<Order>> {
        let orders = db::orders::find_by_intent(self.store.as_ref(), intent_id).await?;
        let mut changed = Vec::new();

        for order in orders {
            if order.payment_status == Some(status)
                || order.payment_status == Some(PaymentStatus::Refunded)
            {
                continue;
            }
            let guard = match order.payment_status {
                Some(previous) => Condition::equals("payment_status", previous.as_str()),
                None => Condition::absent("payment_status"),
            };
            let update = Update::new()
                .set("payment_status", status.as_str())
                .set("updated_at", shared::util::now_millis());

            match db::orders::update_where(self.store.as_ref(), &order.id, update, guard).await {
                Ok(updated) => {
                    tracing::info!(order_id = %updated.id, payment_status = %status, "Payment status recorded");
                    self.audit
                        .record(
                            &Actor::system(),
                            ActivityAction::Update,
                            EntityType::Order,
                            &updated.id,
                            json!({
                                "payment_intent_id": intent_id,
                                "previous_payment_status": order.payment_status.map(|s| s.as_str()),
                                "payment_status": status.as_str(),
                            }),
                        )
                        .await;
                    changed.push(updated);
                }
                Err(StoreError::Conflict) => {
                    tracing::debug!(order_id = %order.id, "Payment status already moved, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(changed)
    }
}

fn with_tracking(mut update: Update, t: &Tracking) -> Update {
    let fields = [
        ("tracking_number", &t.tracking_number),
        ("tracking_carrier", &t.tracking_carrier),
        ("tracking_url", &t.tracking_url),
        ("label_url", &t.label_url),
    ];
    for (attr, value) in fields {
        if let Some(v) = value {
            update = update.set(attr, v.as_str());
        }
    }
    update
}

fn tracking_details(t: &Tracking) -> Value {
    let mut map = BTreeMap::new();
    for (key, value) in [
        ("tracking_number", &t.tracking_number),
        ("tracking_carrier", &t.tracking_carrier),
        ("tracking_url", &t.tracking_url),
        ("label_url", &t.label_url),
    ] {
        if let Some(v) = value {
            map.insert(key, v.clone());
        }
    }
    json!(map)
}

fn restores_summary(restores: &[StockRestore]) -> Value {
    json!({
        "total": restores.len(),
        "succeeded": restores.iter().filter(|r| r.success).count(),
    })
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(t), Value::Object(e)) = (target, extra) {
        t.extend(e);
    }
}
