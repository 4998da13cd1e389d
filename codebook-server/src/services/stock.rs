//! Stock reservation and restoration
//!
//! Every adjustment is a single conditional update on `stock`, so concurrent
//! orders for the same product are serialised by the store. Products without
//! a `stock` attribute are untracked: they never block an order and never
//! raise stock alerts.

use std::sync::Arc;

use serde_json::Value;
use shared::models::{CartItem, Product, StockRestore};
use thiserror::Error;

use crate::db::{self, Condition, Store, StoreError, Update};
use crate::email::{self, Notifier, Template};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("insufficient stock for product {product_id}")]
    Insufficient { product_id: String },
    #[error("product {0} not found")]
    ProductNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a single reservation
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// Stock decremented; carries the product as written
    Reserved(Product),
    Untracked,
    /// Product could not be read (transient); order proceeds without a decrement
    Skipped,
}

impl Reservation {
    fn decremented(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }
}

pub struct StockService {
    store: Arc<dyn Store>,
    notifier: Arc<Notifier>,
}

impl StockService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Reserve `quantity` units and raise low/out-of-stock alerts
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> Result<Reservation, StockError> {
        let reservation = self.decrement(product_id, quantity).await?;
        if let Reservation::Reserved(product) = &reservation {
            self.alert(product).await;
        }
        Ok(reservation)
    }

    /// Reserve every line in cart order
    ///
    /// On the first failure the lines already reserved are restored in
    /// reverse order before the error is returned. Alerts are only sent once
    /// the whole cart is reserved. Returns the lines that were decremented.
    pub async fn reserve_all(&self, items: &[CartItem]) -> Result<Vec<CartItem>, StockError> {
        let mut reserved: Vec<(CartItem, Reservation)> = Vec::with_capacity(items.len());

        for item in items {
            match self.decrement(&item.product_id, item.quantity).await {
                Ok(r) => reserved.push((item.clone(), r)),
                Err(e) => {
                    tracing::info!(
                        product_id = %item.product_id,
                        error = %e,
                        reserved = reserved.len(),
                        "Reservation failed, releasing earlier lines"
                    );
                    for (line, r) in reserved.iter().rev() {
                        if r.decremented() {
                            let outcome = self.restore(&line.product_id, line.quantity).await;
                            if !outcome.success {
                                tracing::error!(
                                    product_id = %line.product_id,
                                    quantity = line.quantity,
                                    error = ?outcome.error,
                                    "Failed to release reserved stock"
                                );
                            }
                        }
                    }
                    return Err(e);
                }
            }
        }

        for (_, r) in &reserved {
            if let Reservation::Reserved(product) = r {
                self.alert(product).await;
            }
        }

        Ok(reserved
            .into_iter()
            .filter(|(_, r)| r.decremented())
            .map(|(line, _)| line)
            .collect())
    }

    /// Put `quantity` units back; never fails, the outcome says what happened
    pub async fn restore(&self, product_id: &str, quantity: i64) -> StockRestore {
        let mut outcome = StockRestore {
            product_id: product_id.to_string(),
            quantity,
            success: false,
            new_stock: None,
            error: None,
        };

        let product = match db::products::get(self.store.as_ref(), product_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                outcome.error = Some("product not found".into());
                return outcome;
            }
            Err(e) => {
                tracing::warn!(product_id, error = %e, "Stock restore skipped, product unreadable");
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        if !product.is_tracked() {
            outcome.success = true;
            return outcome;
        }

        let update = Update::new()
            .add("stock", quantity)
            .set("updated_at", shared::util::now_millis());
        match db::products::update(
            self.store.as_ref(),
            product_id,
            update,
            Some(Condition::present("stock")),
        )
        .await
        {
            Ok(updated) => {
                tracing::info!(product_id, quantity, new_stock = ?updated.stock, "Stock restored");
                outcome.success = true;
                outcome.new_stock = updated.stock;
                self.resync_in_stock(&updated).await;
            }
            Err(e) => {
                tracing::warn!(product_id, quantity, error = %e, "Stock restore failed");
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    /// Restore every line of a cart
    pub async fn restore_all(&self, items: &[CartItem]) -> Vec<StockRestore> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.restore(&item.product_id, item.quantity).await);
        }
        outcomes
    }

    async fn decrement(&self, product_id: &str, quantity: i64) -> Result<Reservation, StockError> {
        let product = match db::products::get(self.store.as_ref(), product_id).await {
            Ok(Some(p)) => p,
            Ok(None) => return Err(StockError::ProductNotFound(product_id.to_string())),
            Err(e @ (StoreError::Throttled(_) | StoreError::Unavailable(_))) => {
                tracing::warn!(product_id, error = %e, "Stock check skipped, product unreadable");
                return Ok(Reservation::Skipped);
            }
            Err(e) => return Err(e.into()),
        };
        if !product.is_tracked() {
            return Ok(Reservation::Untracked);
        }

        let guard = Condition::All(vec![
            Condition::present("stock"),
            Condition::at_least("stock", quantity),
        ]);
        let update = Update::new()
            .add("stock", -quantity)
            .set("updated_at", shared::util::now_millis());

        match db::products::update(self.store.as_ref(), product_id, update, Some(guard)).await {
            Ok(updated) => {
                tracing::info!(product_id, quantity, new_stock = ?updated.stock, "Stock reserved");
                self.resync_in_stock(&updated).await;
                Ok(Reservation::Reserved(updated))
            }
            Err(StoreError::Conflict) => Err(StockError::Insufficient {
                product_id: product_id.to_string(),
            }),
            Err(StoreError::NotFound) => Err(StockError::ProductNotFound(product_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Align `in_stock` with `stock`; only lands while the two still disagree
    async fn resync_in_stock(&self, product: &Product) {
        let Some(stock) = product.stock else {
            return;
        };
        let desired = stock > 0;
        if product.in_stock == desired {
            return;
        }

        let stock_side = if desired {
            Condition::at_least("stock", 1)
        } else {
            Condition::at_most("stock", 0)
        };
        let guard = Condition::All(vec![
            stock_side,
            Condition::Any(vec![
                Condition::absent("in_stock"),
                Condition::equals("in_stock", !desired),
            ]),
        ]);

        match db::products::update(
            self.store.as_ref(),
            &product.id,
            Update::new().set("in_stock", desired),
            Some(guard),
        )
        .await
        {
            Ok(_) => tracing::debug!(product_id = %product.id, in_stock = desired, "in_stock resynced"),
            // Another adjustment already moved stock or fixed the flag
            Err(StoreError::Conflict) => {}
            Err(e) => tracing::warn!(product_id = %product.id, error = %e, "in_stock resync failed"),
        }
    }

    async fn alert(&self, product: &Product) {
        let Some(stock) = product.stock else {
            return;
        };
        let template = if stock == 0 {
            Template::AdminOutOfStock
        } else if stock <= product.low_stock_threshold {
            Template::AdminLowStock
        } else {
            return;
        };
        let data: Value = email::stock_data(product, stock);
        self.notifier.notify_admin(template, &data).await;
    }
}
