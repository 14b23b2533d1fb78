use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub username: String,
    pub order_number: String,
    pub sum: Decimal,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/user/withdrawals` entry shape.
#[derive(Debug, Serialize)]
pub struct WithdrawalView {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<&Withdrawal> for WithdrawalView {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number.clone(),
            sum: withdrawal.sum,
            processed_at: withdrawal.created_at,
        }
    }
}
