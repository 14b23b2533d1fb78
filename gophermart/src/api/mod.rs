mod balance;
mod login;
mod orders;
mod register;
mod withdraw;
mod withdrawals;

use crate::{
    auth::AuthSecret,
    error::{ApiError, ApiReply},
    services::{BalanceService, OrderService},
    store::Store,
};
use serde::de::DeserializeOwned;
use std::{convert::Infallible, sync::Arc, time::Duration};
use warp::{Filter, Rejection, Reply};

/// Everything a handler needs, cloned (cheaply, everything inside is `Arc`-backed) into every
/// route.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub order_service: Arc<OrderService>,
    pub balance_service: Arc<BalanceService>,
    pub auth_secret: AuthSecret,
    /// Overall deadline for a single request, stands in for the original's chi `Timeout(60s)`.
    pub request_timeout: Duration,
}

pub fn handle_all_routes(
    ctx: AppContext,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = register::route(ctx.clone());
    let login = login::route(ctx.clone());
    let upload_order = orders::upload_route(ctx.clone());
    let list_orders = orders::list_route(ctx.clone());
    let balance = balance::route(ctx.clone());
    let withdraw = withdraw::route(ctx.clone());
    let withdrawals = withdrawals::route(ctx);

    let routes = register
        .or(login)
        .or(upload_order)
        .or(list_orders)
        .or(balance)
        .or(withdraw)
        .or(withdrawals);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["Content-Type", "Authorization"]);

    warp::path!("api" / "user" / ..)
        .and(routes)
        .recover(recover)
        .with(cors)
        .with(warp::log::custom(|info| {
            tracing::info!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed = ?info.elapsed(),
                "request",
            );
        }))
        .with(warp::compression::gzip())
}

const MAX_JSON_BODY_PAYLOAD: u64 = 1024 * 16;

fn extract_json<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_PAYLOAD).and(warp::body::json())
}

/// A successful `register`/`login`: an empty JSON body with the bearer token in the header the
/// spec names, since it never defined a token field in the response payload.
fn authenticated_reply(token: &str) -> ApiReply {
    warp::reply::with_header(
        warp::reply::json(&serde_json::json!({})),
        "authorization",
        format!("Bearer {token}"),
    )
    .into_response()
}

/// Any panic unwound out of a handler (caught in the handler's own `catch_unwind`, see
/// `api::run_handler`) surfaces here as a rejection, not a crashed connection.
async fn recover(err: Rejection) -> Result<impl Reply, Infallible> {
    match crate::auth::handle_auth_rejection(err).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!(?err, "unhandled rejection");
            Ok(ApiError::Fatal(anyhow::anyhow!("{err:?}")).into_warp_reply())
        }
    }
}

/// Runs `body` under `timeout`, converting a panic into a 500 and an expired deadline into a
/// 503 instead of tearing down the connection.
async fn run_handler<F>(timeout: Duration, body: F) -> Result<impl Reply, Infallible>
where
    F: std::future::Future<Output = Result<ApiReply, ApiError>>,
{
    use futures::FutureExt;
    let guarded = tokio::time::timeout(timeout, std::panic::AssertUnwindSafe(body).catch_unwind());
    match guarded.await {
        Ok(Ok(Ok(reply))) => Ok(reply),
        Ok(Ok(Err(err))) => Ok(err.into_warp_reply()),
        Ok(Err(panic)) => {
            tracing::error!(?panic, "handler panicked");
            Ok(ApiError::Fatal(anyhow::anyhow!("handler panicked")).into_warp_reply())
        }
        Err(_) => {
            tracing::error!(?timeout, "request exceeded deadline");
            Ok(ApiError::RequestTimeout.into_warp_reply())
        }
    }
}
