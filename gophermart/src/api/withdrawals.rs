//! `GET /api/user/withdrawals`.
use super::{run_handler, AppContext};
use crate::{
    auth::require_user,
    error::{ApiError, ApiReply},
};
use warp::{Filter, Rejection, Reply};

fn request_filter(ctx: &AppContext) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::path!("withdrawals")
        .and(warp::get())
        .and(require_user(ctx.auth_secret.clone()))
}

pub fn route(ctx: AppContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    request_filter(&ctx).and_then(move |user: String| {
        let ctx = ctx.clone();
        run_handler(ctx.request_timeout, handle(ctx, user))
    })
}

async fn handle(ctx: AppContext, user: String) -> Result<ApiReply, ApiError> {
    let withdrawals = ctx.balance_service.list_withdrawals(&user).await?;
    Ok(warp::reply::json(&withdrawals).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth,
        services::{BalanceService, OrderService},
        store::fake::FakeStore,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn no_withdrawals_yields_no_content() {
        let store = Arc::new(FakeStore::new());
        store
            .create_user_with_balance("alice", "hash")
            .await
            .unwrap();
        let ctx = AppContext {
            order_service: Arc::new(OrderService::new(store.clone(), 256)),
            balance_service: Arc::new(BalanceService::new(store.clone())),
            store,
            auth_secret: auth::AuthSecret::new("test-secret".to_string()),
            request_timeout: std::time::Duration::from_secs(60),
        };
        assert!(matches!(
            handle(ctx, "alice".to_string()).await,
            Err(ApiError::NoWithdrawals)
        ));
    }
}
