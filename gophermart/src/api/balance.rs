//! `GET /api/user/balance`.
use super::{run_handler, AppContext};
use crate::{
    auth::require_user,
    error::{ApiError, ApiReply},
};
use warp::{Filter, Rejection, Reply};

fn request_filter(ctx: &AppContext) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::path!("balance")
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
    let stats = ctx.balance_service.stats(&user).await?;
    Ok(warp::reply::json(&stats).into_response())
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
    async fn fresh_user_has_zero_balance() {
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
        let response = handle(ctx, "alice".to_string()).await.unwrap();
        assert_eq!(response.status(), warp::hyper::StatusCode::OK);
    }
}
