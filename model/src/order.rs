use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an uploaded order.
///
/// Transitions only ever go NEW -> {PROCESSING, INVALID, PROCESSED} or
/// PROCESSING -> {INVALID, PROCESSED}. PROCESSED and INVALID are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Order {
    pub number: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub accrual: Decimal,
    pub key_hash: i64,
    pub shard: i32,
    pub version: i64,
}

/// The shape handed back by `GET /api/user/orders`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OrderView {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.clone(),
            status: order.status,
            accrual: matches!(order.status, OrderStatus::Processed).then_some(order.accrual),
            uploaded_at: order.created_at,
        }
    }
}
