use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Balance {
    pub username: String,
    pub amount: Decimal,
    pub version: i64,
}

/// `GET /api/user/balance` response: current amount plus the lifetime withdrawn total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, sqlx::FromRow)]
pub struct BalanceStats {
    #[serde(rename = "current")]
    pub amount: Decimal,
    pub withdrawn: Decimal,
}
