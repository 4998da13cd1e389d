//! CodeBook bookstore backend
//!
//! Catalog, accounts, orders with stock reservation, card payments through
//! Stripe, shipping labels through Shippo, transactional email and an
//! audit trail of admin actions.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod money;
pub mod orders;
pub mod services;
pub mod shipping;
pub mod state;
pub mod stripe;
pub mod util;

#[cfg(test)]
pub mod testing;
