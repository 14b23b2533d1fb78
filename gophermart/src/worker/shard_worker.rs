//! A single shard worker: fetch-pending -> rate-limit -> call accrual -> commit, per §4.7.
use super::rate_limiter::RateLimiter;
use crate::store::{CasOutcome, Store};
use model::OrderStatus;
use rust_decimal::Decimal;
use shared::accrual_client::{AccrualApi, AccrualOutcome};
use std::sync::Arc;
use tokio::sync::watch;

const PENDING_BATCH_SIZE: i64 = 100;

pub struct ShardWorker {
    pub from: u32,
    pub to: u32,
    store: Arc<dyn Store>,
    accrual: Arc<dyn AccrualApi>,
    rate_limiter: RateLimiter,
}

impl ShardWorker {
    pub fn new(from: u32, to: u32, store: Arc<dyn Store>, accrual: Arc<dyn AccrualApi>) -> Self {
        Self {
            from,
            to,
            store,
            accrual,
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Runs until `cancellation` fires, checked once per iteration so an in-flight HTTP call or
    /// commit is never abandoned mid-way.
    pub async fn run(mut self, mut cancellation: watch::Receiver<bool>) {
        loop {
            if *cancellation.borrow() {
                tracing::info!(from = self.from, to = self.to, "worker shutting down");
                return;
            }
            self.run_once().await;
        }
    }

    /// One polling cycle: fetch the shard's pending orders and settle each in turn. Returns the
    /// number of orders processed, for tests.
    pub async fn run_once(&mut self) -> usize {
        let orders = match self
            .store
            .find_pending_shard(self.from, self.to, PENDING_BATCH_SIZE)
            .await
        {
            Ok(orders) => orders,
            Err(err) => {
                tracing::error!(?err, from = self.from, to = self.to, "failed to poll pending shard");
                return 0;
            }
        };

        for order in &orders {
            self.rate_limiter.acquire().await;

            let outcome = match self.accrual.fetch(&order.number).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(?err, order = %order.number, "accrual fetch failed, will retry next cycle");
                    continue;
                }
            };

            let (status, accrual) = match outcome {
                AccrualOutcome::NotRegistered => continue,
                AccrualOutcome::Known(response) => {
                    let status: OrderStatus = response.status.into();
                    if status.is_terminal() {
                        (status, response.accrual())
                    } else {
                        (OrderStatus::Processing, Decimal::ZERO)
                    }
                }
            };

            match self.store.commit_accrual(order, status, accrual).await {
                Ok(CasOutcome::Committed) => {}
                Ok(CasOutcome::Raced) => {
                    tracing::debug!(order = %order.number, "commit raced, next cycle will retry");
                }
                Err(err) => {
                    tracing::error!(?err, order = %order.number, "failed to commit accrual result");
                }
            }
        }

        orders.len()
    }
}
