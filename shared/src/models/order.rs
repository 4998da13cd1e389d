//! Order Model
//!
//! Orders snapshot the buying user and every cart line so a historical order
//! stays readable after the product or user it references has changed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status
///
/// ```text
/// pending → processing → shipped → delivered
/// pending → cancelled, processing → cancelled
/// cancelled → refunded
/// pending / processing / shipped → refunded
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    #[serde(alias = "canceled")]
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether `self → next` is an allowed edge. Re-entering the same state is not.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Cancelled, Refunded)
                | (Pending, Refunded)
                | (Processing, Refunded)
                | (Shipped, Refunded)
        )
    }

    /// No outgoing edges
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Payment state recorded on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    Processing,
    RequiresAction,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::Processing => "processing",
            Self::RequiresAction => "requires_action",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_quantity() -> i64 {
    1
}

/// Σ quantity over cart lines; `None` on overflow
pub fn cart_quantity(items: &[CartItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |n, i| n.checked_add(i.quantity))
}

/// Cart line, embedded in an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(alias = "id")]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    /// Older records were written without a quantity; they mean one copy
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Snapshot of the ordering user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Order entity (`orders` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub user: OrderUser,
    pub cart_list: Vec<CartItem>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_url: Option<String>,
    /// Minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,
    /// Lines whose stock was decremented at creation; `None` on older
    /// records, which reserved every line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_items: Option<Vec<CartItem>>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Order {
    /// Σ item quantity, computed from the cart rather than the stored field
    pub fn item_count(&self) -> i64 {
        self.cart_list
            .iter()
            .fold(0i64, |n, i| n.saturating_add(i.quantity))
    }

    /// Lines to put back on cancel or refund
    pub fn reserved_lines(&self) -> &[CartItem] {
        self.reserved_items.as_deref().unwrap_or(&self.cart_list)
    }

    pub fn has_tracking(&self) -> bool {
        self.tracking_number.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Per-item outcome of putting stock back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRestore {
    pub product_id: String,
    pub quantity: i64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Order as returned by mutating endpoints; `_stock_restores` is never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    #[serde(rename = "_stock_restores", default)]
    pub stock_restores: Vec<StockRestore>,
}

impl OrderResponse {
    pub fn new(order: Order, stock_restores: Vec<StockRestore>) -> Self {
        Self {
            order,
            stock_restores,
        }
    }
}
