//! `POST /api/user/register`: create a user, set up its zero balance, and log them in.
use super::{extract_json, run_handler, AppContext};
use crate::{auth, error::ApiError, error::ApiReply, store::CreateUserOutcome};
use model::Credentials;
use warp::{Filter, Rejection, Reply};

fn request_filter() -> impl Filter<Extract = (Credentials,), Error = Rejection> + Clone {
    warp::path!("register")
        .and(warp::post())
        .and(extract_json())
}

pub fn route(ctx: AppContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    request_filter().and_then(move |credentials: Credentials| {
        let ctx = ctx.clone();
        run_handler(ctx.request_timeout, handle(ctx, credentials))
    })
}

async fn handle(ctx: AppContext, credentials: Credentials) -> Result<ApiReply, ApiError> {
    if credentials.login.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::InvalidPayload);
    }
    let password_hash = auth::hash_password(&credentials.password)?;
    match ctx
        .store
        .create_user_with_balance(&credentials.login, &password_hash)
        .await?
    {
        CreateUserOutcome::AlreadyExists => Err(ApiError::UserAlreadyExists),
        CreateUserOutcome::Created => {
            let token = auth::issue(&ctx.auth_secret, &credentials.login)?;
            Ok(super::authenticated_reply(&token))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::{BalanceService, OrderService}, store::fake::FakeStore};
    use std::sync::Arc;
    use warp::test::request;

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
    async fn register_request_extracts_credentials() {
        let filter = request_filter();
        let credentials = Credentials {
            login: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let result = request()
            .path("/register")
            .method("POST")
            .json(&credentials)
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(result.login, "alice");
    }

    #[tokio::test]
    async fn registering_twice_conflicts() {
        let ctx = ctx();
        let credentials = Credentials {
            login: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let first = handle(ctx.clone(), credentials.clone()).await;
        assert!(first.is_ok());
        let second = handle(ctx, credentials).await;
        assert!(matches!(second, Err(ApiError::UserAlreadyExists)));
    }
}
