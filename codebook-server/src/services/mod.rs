//! Domain services shared by the order flow and the admin API

pub mod catalog;
pub mod stock;

pub use catalog::CatalogService;
pub use stock::{StockError, StockService};
