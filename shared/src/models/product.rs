//! Product Model

use serde::{Deserialize, Serialize};

/// Default `low_stock_threshold` for products that never set one
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Maximum number of products carrying `featured_product = 1`
pub const MAX_FEATURED_PRODUCTS: usize = 3;

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

/// Product entity (`products` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price in currency units
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub long_description: String,
    /// Absent means stock is not tracked for this product
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default, with = "super::flag")]
    pub best_seller: bool,
    #[serde(default, with = "super::flag")]
    pub featured_product: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_local: Option<String>,
    /// Page count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Product {
    pub fn is_tracked(&self) -> bool {
        self.stock.is_some()
    }

    /// `in_stock` value implied by `stock`, or `None` when untracked
    pub fn derived_in_stock(&self) -> Option<bool> {
        self.stock.map(|s| s > 0)
    }
}

/// Create product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    /// Only honoured for untracked products; tracked products derive it from `stock`
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default, with = "super::flag::option")]
    pub best_seller: Option<bool>,
    #[serde(default, with = "super::flag::option")]
    pub featured_product: Option<bool>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub image_local: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Update product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default, with = "super::flag::option")]
    pub best_seller: Option<bool>,
    #[serde(default, with = "super::flag::option")]
    pub featured_product: Option<bool>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub image_local: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}
