//! An in-memory [`Store`] used by unit tests so intake, balance and worker logic can be
//! exercised without Postgres. Not part of the production binary.
#![cfg(test)]

use super::{CasOutcome, CreateOrderOutcome, CreateUserOutcome, NewOrder, Store};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use model::{Balance, BalanceStats, Order, OrderStatus, User, Withdrawal};
use rust_decimal::Decimal;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<User>,
    balances: Vec<Balance>,
    orders: Vec<Order>,
    withdrawals: Vec<Withdrawal>,
}

pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn user_exists(&self, username: &str) -> Result<bool, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .any(|u| u.username == username))
    }

    async fn create_user_with_balance(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.username == username) {
            return Ok(CreateUserOutcome::AlreadyExists);
        }
        state.users.push(User {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        });
        state.balances.push(Balance {
            username: username.to_string(),
            amount: Decimal::ZERO,
            version: 0,
        });
        Ok(CreateUserOutcome::Created)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn order_exists(&self, number: &str) -> Result<bool, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .any(|o| o.number == number))
    }

    async fn find_order(&self, number: &str) -> Result<Option<Order>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.number == number)
            .cloned())
    }

    async fn create_order(&self, order: NewOrder) -> Result<CreateOrderOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.orders.iter().any(|o| o.number == order.number) {
            return Ok(CreateOrderOutcome::AlreadyExists);
        }
        let now = Utc::now();
        state.orders.push(Order {
            number: order.number,
            owner: order.owner,
            created_at: now,
            updated_at: now,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            key_hash: order.key_hash,
            shard: order.shard,
            version: 0,
        });
        Ok(CreateOrderOutcome::Created)
    }

    async fn list_orders(&self, username: &str) -> Result<Vec<Order>, ApiError> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .filter(|o| o.owner == username)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn find_pending_shard(
        &self,
        from: u32,
        to: u32,
        limit: i64,
    ) -> Result<Vec<Order>, ApiError> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .filter(|o| {
                o.status.is_pending() && (o.shard as u32) >= from && (o.shard as u32) < to
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn commit_accrual(
        &self,
        order: &Order,
        new_status: OrderStatus,
        accrual: Decimal,
    ) -> Result<CasOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();

        // Mirrors the transactional store: check every CAS condition before mutating anything,
        // so a raced order row never leaves a balance credited against it.
        let order_matches = state
            .orders
            .iter()
            .find(|o| o.number == order.number)
            .map(|stored| stored.version == order.version)
            .unwrap_or(false);
        if !order_matches {
            return Ok(CasOutcome::Raced);
        }

        if new_status == OrderStatus::Processed {
            let balance = state
                .balances
                .iter_mut()
                .find(|b| b.username == order.owner)
                .expect("balance row must exist for every user");
            balance.amount += accrual;
            balance.version += 1;
        }

        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.number == order.number)
            .expect("order must exist");
        stored.status = new_status;
        stored.accrual = accrual;
        stored.updated_at = Utc::now();
        stored.version += 1;
        Ok(CasOutcome::Committed)
    }

    async fn find_balance(&self, username: &str) -> Result<Option<Balance>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .iter()
            .find(|b| b.username == username)
            .cloned())
    }

    async fn find_balance_stats(&self, username: &str) -> Result<BalanceStats, ApiError> {
        let state = self.state.lock().unwrap();
        let amount = state
            .balances
            .iter()
            .find(|b| b.username == username)
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO);
        let withdrawn = state
            .withdrawals
            .iter()
            .filter(|w| w.username == username)
            .map(|w| w.sum)
            .sum();
        Ok(BalanceStats { amount, withdrawn })
    }

    async fn withdraw(
        &self,
        balance: &Balance,
        sum: Decimal,
        order_number: &str,
    ) -> Result<CasOutcome, ApiError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .balances
            .iter_mut()
            .find(|b| b.username == balance.username)
            .expect("balance must exist");
        if stored.version != balance.version {
            return Ok(CasOutcome::Raced);
        }
        stored.amount -= sum;
        stored.version += 1;
        state.withdrawals.push(Withdrawal {
            id: Uuid::new_v4(),
            username: balance.username.clone(),
            order_number: order_number.to_string(),
            sum,
            created_at: Utc::now(),
        });
        Ok(CasOutcome::Committed)
    }

    async fn list_withdrawals(&self, username: &str) -> Result<Vec<Withdrawal>, ApiError> {
        let mut withdrawals: Vec<Withdrawal> = self
            .state
            .lock()
            .unwrap()
            .withdrawals
            .iter()
            .filter(|w| w.username == username)
            .cloned()
            .collect();
        withdrawals.sort_by_key(|w| w.created_at);
        Ok(withdrawals)
    }
}
