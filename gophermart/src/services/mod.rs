//! Business logic sitting between the HTTP handlers and the [`crate::store::Store`] seam.
pub mod balance_service;
pub mod order_service;

pub use balance_service::BalanceService;
pub use order_service::OrderService;
