//! The transactional store seam (C1): persistence for users, balances, orders and withdrawals.
//!
//! `Store` is the trait the rest of the crate programs against. The only production
//! implementation is [`postgres::PgStore`]; [`fake::FakeStore`] backs unit tests so the intake,
//! balance and worker logic can be exercised without Postgres.
pub mod fake;
pub mod postgres;

use crate::error::ApiError;
use async_trait::async_trait;
use model::{Balance, BalanceStats, Order, OrderStatus, User, Withdrawal};
use rust_decimal::Decimal;

/// Everything needed to insert a brand new order row. Timestamps, shard and key hash are
/// computed by the caller (the order-intake service) so the store stays a dumb persistence seam.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: String,
    pub owner: String,
    pub key_hash: i64,
    pub shard: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOrderOutcome {
    Created,
    AlreadyExists,
}

/// Outcome of a version-guarded (optimistic-lock) write: either it landed, or another writer
/// raced it and the caller should retry on fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed,
    Raced,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn user_exists(&self, username: &str) -> Result<bool, ApiError>;

    /// Inserts the user and its zero balance in one transaction.
    async fn create_user_with_balance(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, ApiError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, ApiError>;

    async fn order_exists(&self, number: &str) -> Result<bool, ApiError>;

    async fn find_order(&self, number: &str) -> Result<Option<Order>, ApiError>;

    /// Inserts a NEW order with version 0. Returns `AlreadyExists` instead of erroring on a
    /// unique-constraint violation so the caller can re-read and classify the conflict.
    async fn create_order(&self, order: NewOrder) -> Result<CreateOrderOutcome, ApiError>;

    async fn list_orders(&self, username: &str) -> Result<Vec<Order>, ApiError>;

    /// Orders with status in {NEW, PROCESSING} whose shard falls in `[from, to)`, oldest first.
    async fn find_pending_shard(
        &self,
        from: u32,
        to: u32,
        limit: i64,
    ) -> Result<Vec<Order>, ApiError>;

    /// Commits the worker's verdict on `order` and, when `new_status` is PROCESSED, credits the
    /// owner's balance in the same transaction. Guarded by `order.version`; a concurrent writer
    /// (another polling cycle that somehow raced this one) yields `Raced` and the transaction
    /// rolls back, leaving the order in its prior pending state for the next cycle to retry.
    async fn commit_accrual(
        &self,
        order: &Order,
        new_status: OrderStatus,
        accrual: Decimal,
    ) -> Result<CasOutcome, ApiError>;

    async fn find_balance(&self, username: &str) -> Result<Option<Balance>, ApiError>;

    async fn find_balance_stats(&self, username: &str) -> Result<BalanceStats, ApiError>;

    /// Debits `balance.amount` by `sum` guarded by `balance.version`, and appends a withdrawal
    /// row, in one transaction. `order_number` is the client-supplied reference and is not
    /// validated against the orders table.
    async fn withdraw(
        &self,
        balance: &Balance,
        sum: Decimal,
        order_number: &str,
    ) -> Result<CasOutcome, ApiError>;

    async fn list_withdrawals(&self, username: &str) -> Result<Vec<Withdrawal>, ApiError>;
}
