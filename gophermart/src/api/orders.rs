//! `POST /api/user/orders` (upload, `text/plain` body) and `GET /api/user/orders` (list).
use super::{run_handler, AppContext};
use crate::{
    auth::require_user,
    error::{ApiError, ApiReply},
    services::order_service::UploadOutcome,
};
use warp::{hyper::StatusCode, Filter, Rejection, Reply};

fn upload_request(
    ctx: &AppContext,
) -> impl Filter<Extract = (String, String), Error = Rejection> + Clone {
    warp::path!("orders")
        .and(warp::post())
        .and(require_user(ctx.auth_secret.clone()))
        .and(warp::body::content_length_limit(1024).and(warp::body::bytes()).map(|body: bytes::Bytes| {
            String::from_utf8_lossy(&body).trim().to_string()
        }))
}

pub fn upload_route(
    ctx: AppContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    upload_request(&ctx).and_then(move |user: String, number: String| {
        let ctx = ctx.clone();
        run_handler(ctx.request_timeout, handle_upload(ctx, user, number))
    })
}

async fn handle_upload(ctx: AppContext, user: String, number: String) -> Result<ApiReply, ApiError> {
    match ctx.order_service.upload(&user, &number).await? {
        UploadOutcome::Created => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({})),
            StatusCode::ACCEPTED,
        )
        .into_response()),
        UploadOutcome::AlreadyMine => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({})),
            StatusCode::OK,
        )
        .into_response()),
    }
}

fn list_request(ctx: &AppContext) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::path!("orders")
        .and(warp::get())
        .and(require_user(ctx.auth_secret.clone()))
}

pub fn list_route(
    ctx: AppContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    list_request(&ctx).and_then(move |user: String| {
        let ctx = ctx.clone();
        run_handler(ctx.request_timeout, handle_list(ctx, user))
    })
}

async fn handle_list(ctx: AppContext, user: String) -> Result<ApiReply, ApiError> {
    let orders = ctx.order_service.list(&user).await?;
    Ok(warp::reply::json(&orders).into_response())
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

    fn ctx() -> AppContext {
        let store = Arc::new(FakeStore::new());
        AppContext {
            order_service: Arc::new(OrderService::new(store.clone(), 256)),
            balance_service: Arc::new(BalanceService::new(store.clone())),
            store,
            auth_secret: auth::AuthSecret::new("test-secret".to_string()),
            request_timeout: std::time::Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn upload_then_list_round_trips() {
        let ctx = ctx();
        ctx.store
            .create_user_with_balance("alice", "hash")
            .await
            .unwrap();
        let response = handle_upload(ctx.clone(), "alice".to_string(), "12345678903".to_string())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let orders = ctx.order_service.list("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].number, "12345678903");
    }

    #[tokio::test]
    async fn re_upload_by_owner_is_ok() {
        let ctx = ctx();
        ctx.store
            .create_user_with_balance("alice", "hash")
            .await
            .unwrap();
        handle_upload(ctx.clone(), "alice".to_string(), "12345678903".to_string())
            .await
            .unwrap();
        let response = handle_upload(ctx, "alice".to_string(), "12345678903".to_string())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_list_is_no_content() {
        let ctx = ctx();
        ctx.store
            .create_user_with_balance("alice", "hash")
            .await
            .unwrap();
        let result = handle_list(ctx, "alice".to_string()).await;
        assert!(matches!(result, Err(ApiError::NoOrders)));
    }
}
