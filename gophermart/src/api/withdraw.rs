//! `POST /api/user/balance/withdraw`.
use super::{extract_json, run_handler, AppContext};
use crate::{
    auth::require_user,
    error::{ApiError, ApiReply},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use warp::{hyper::StatusCode, Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    order: String,
    sum: Decimal,
}

fn request_filter(
    ctx: &AppContext,
) -> impl Filter<Extract = (String, WithdrawRequest), Error = Rejection> + Clone {
    warp::path!("balance" / "withdraw")
        .and(warp::post())
        .and(require_user(ctx.auth_secret.clone()))
        .and(extract_json())
}

pub fn route(ctx: AppContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    request_filter(&ctx).and_then(move |user: String, request: WithdrawRequest| {
        let ctx = ctx.clone();
        run_handler(ctx.request_timeout, handle(ctx, user, request))
    })
}

async fn handle(ctx: AppContext, user: String, request: WithdrawRequest) -> Result<ApiReply, ApiError> {
    ctx.balance_service
        .withdraw(&user, &request.order, request.sum)
        .await?;
    Ok(warp::reply::with_status(warp::reply::json(&serde_json::json!({})), StatusCode::OK)
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth,
        services::{BalanceService, OrderService},
        store::{fake::FakeStore, Store},
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn seeded(amount: Decimal) -> AppContext {
        let store = Arc::new(FakeStore::new());
        store
            .create_user_with_balance("alice", "hash")
            .await
            .unwrap();
        let order = model::Order {
            number: "12345678903".to_string(),
            owner: "alice".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            status: model::OrderStatus::New,
            accrual: Decimal::ZERO,
            key_hash: 0,
            shard: 0,
            version: 0,
        };
        store
            .commit_accrual(&order, model::OrderStatus::Processed, amount)
            .await
            .unwrap();
        AppContext {
            order_service: Arc::new(OrderService::new(store.clone(), 256)),
            balance_service: Arc::new(BalanceService::new(store.clone())),
            store,
            auth_secret: auth::AuthSecret::new("test-secret".to_string()),
            request_timeout: std::time::Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn withdraw_ok() {
        let ctx = seeded(dec!(500)).await;
        let response = handle(
            ctx,
            "alice".to_string(),
            WithdrawRequest {
                order: "12345678903".to_string(),
                sum: dec!(100),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn withdraw_insufficient_funds() {
        let ctx = seeded(dec!(10)).await;
        let result = handle(
            ctx,
            "alice".to_string(),
            WithdrawRequest {
                order: "12345678903".to_string(),
                sum: dec!(100),
            },
        )
        .await;
        assert!(matches!(result, Err(ApiError::InsufficientFunds)));
    }
}
