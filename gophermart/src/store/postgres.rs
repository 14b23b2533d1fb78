//! Postgres-backed [`super::Store`]. Every multi-row mutation runs inside `pool.begin()` and is
//! committed or rolled back on all exit paths (`Transaction`'s `Drop` rolls back automatically if
//! `commit` is never reached).
use super::{CasOutcome, CreateOrderOutcome, CreateUserOutcome, NewOrder, Store};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use model::{Balance, BalanceStats, Order, OrderStatus, User, Withdrawal};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::{borrow::Cow, time::Duration};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(database_uri: &str) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_uri)
            .map_err(|err| ApiError::Fatal(err.into()))?;
        Ok(Self { pool })
    }

    /// Runs the checked-in migrations. Call once at startup.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed(UNIQUE_VIOLATION))
    )
}

fn transient(err: sqlx::Error) -> ApiError {
    ApiError::Transient(err.into())
}

#[async_trait]
impl Store for PgStore {
    async fn user_exists(&self, username: &str) -> Result<bool, ApiError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM gophermart_user WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(transient)
    }

    async fn create_user_with_balance(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, ApiError> {
        let mut tx: Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(transient)?;
        let result = sqlx::query(
            "INSERT INTO gophermart_user (username, password_hash) VALUES ($1, $2)",
        )
        .bind(username)
        .bind(password_hash)
        .execute(&mut tx)
        .await;
        if let Err(err) = &result {
            if is_unique_violation(err) {
                tx.rollback().await.map_err(transient)?;
                return Ok(CreateUserOutcome::AlreadyExists);
            }
        }
        result.map_err(transient)?;

        sqlx::query(
            "INSERT INTO balance (username, amount, version) VALUES ($1, 0, 0)",
        )
        .bind(username)
        .execute(&mut tx)
        .await
        .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(CreateUserOutcome::Created)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT username, password_hash FROM gophermart_user WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)
    }

    async fn order_exists(&self, number: &str) -> Result<bool, ApiError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE number = $1)",
        )
        .bind(number)
        .fetch_one(&self.pool)
        .await
        .map_err(transient)
    }

    async fn find_order(&self, number: &str) -> Result<Option<Order>, ApiError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE number = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)
    }

    async fn create_order(&self, order: NewOrder) -> Result<CreateOrderOutcome, ApiError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO orders \
                (number, owner, created_at, updated_at, status, accrual, key_hash, shard, version) \
             VALUES ($1, $2, $3, $3, 'NEW', 0, $4, $5, 0)",
        )
        .bind(&order.number)
        .bind(&order.owner)
        .bind(now)
        .bind(order.key_hash)
        .bind(order.shard)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(CreateOrderOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(CreateOrderOutcome::AlreadyExists),
            Err(err) => Err(transient(err)),
        }
    }

    async fn list_orders(&self, username: &str) -> Result<Vec<Order>, ApiError> {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE owner = $1 ORDER BY created_at ASC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)
    }

    async fn find_pending_shard(
        &self,
        from: u32,
        to: u32,
        limit: i64,
    ) -> Result<Vec<Order>, ApiError> {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders \
             WHERE status IN ('NEW', 'PROCESSING') AND shard >= $1 AND shard < $2 \
             ORDER BY created_at ASC LIMIT $3",
        )
        .bind(from as i32)
        .bind(to as i32)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)
    }

    async fn commit_accrual(
        &self,
        order: &Order,
        new_status: OrderStatus,
        accrual: Decimal,
    ) -> Result<CasOutcome, ApiError> {
        let mut tx: Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(transient)?;

        if new_status == OrderStatus::Processed {
            let version: i64 = sqlx::query_scalar(
                "SELECT version FROM balance WHERE username = $1",
            )
            .bind(&order.owner)
            .fetch_one(&mut tx)
            .await
            .map_err(transient)?;

            let rows = sqlx::query(
                "UPDATE balance SET amount = amount + $1, version = version + 1 \
                 WHERE username = $2 AND version = $3",
            )
            .bind(accrual)
            .bind(&order.owner)
            .bind(version)
            .execute(&mut tx)
            .await
            .map_err(transient)?;
            if rows.rows_affected() == 0 {
                tx.rollback().await.map_err(transient)?;
                return Ok(CasOutcome::Raced);
            }
        }

        let rows = sqlx::query(
            "UPDATE orders SET status = $1, accrual = $2, updated_at = now(), version = version + 1 \
             WHERE number = $3 AND version = $4",
        )
        .bind(new_status)
        .bind(accrual)
        .bind(&order.number)
        .bind(order.version)
        .execute(&mut tx)
        .await
        .map_err(transient)?;
        if rows.rows_affected() == 0 {
            tx.rollback().await.map_err(transient)?;
            return Ok(CasOutcome::Raced);
        }

        tx.commit().await.map_err(transient)?;
        Ok(CasOutcome::Committed)
    }

    async fn find_balance(&self, username: &str) -> Result<Option<Balance>, ApiError> {
        sqlx::query_as::<_, Balance>(
            "SELECT username, amount, version FROM balance WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)
    }

    async fn find_balance_stats(&self, username: &str) -> Result<BalanceStats, ApiError> {
        sqlx::query_as::<_, BalanceStats>(
            "SELECT b.amount AS amount, \
                    COALESCE((SELECT SUM(w.sum) FROM withdrawal w WHERE w.username = b.username), 0) AS withdrawn \
             FROM balance b WHERE b.username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(transient)
    }

    async fn withdraw(
        &self,
        balance: &Balance,
        sum: Decimal,
        order_number: &str,
    ) -> Result<CasOutcome, ApiError> {
        let mut tx: Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(transient)?;

        let rows = sqlx::query(
            "UPDATE balance SET amount = amount - $1, version = version + 1 \
             WHERE username = $2 AND version = $3",
        )
        .bind(sum)
        .bind(&balance.username)
        .bind(balance.version)
        .execute(&mut tx)
        .await
        .map_err(transient)?;
        if rows.rows_affected() == 0 {
            tx.rollback().await.map_err(transient)?;
            return Ok(CasOutcome::Raced);
        }

        sqlx::query(
            "INSERT INTO withdrawal (id, username, order_number, sum, created_at) \
             VALUES ($1, $2, $3, $4, now())",
        )
        .bind(Uuid::new_v4())
        .bind(&balance.username)
        .bind(order_number)
        .bind(sum)
        .execute(&mut tx)
        .await
        .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(CasOutcome::Committed)
    }

    async fn list_withdrawals(&self, username: &str) -> Result<Vec<Withdrawal>, ApiError> {
        sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawal WHERE username = $1 ORDER BY created_at ASC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)
    }
}
