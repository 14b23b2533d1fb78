//! `POST /api/user/login`.
use super::{extract_json, run_handler, AppContext};
use crate::{auth, error::ApiError, error::ApiReply};
use model::Credentials;
use warp::{Filter, Rejection, Reply};

fn request_filter() -> impl Filter<Extract = (Credentials,), Error = Rejection> + Clone {
    warp::path!("login").and(warp::post()).and(extract_json())
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
    let user = ctx
        .store
        .find_user(&credentials.login)
        .await?
        .ok_or(ApiError::BadCredentials)?;
    auth::verify_password(&credentials.password, &user.password_hash)?;
    let token = auth::issue(&ctx.auth_secret, &user.username)?;
    Ok(super::authenticated_reply(&token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
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
    async fn unknown_login_is_bad_credentials() {
        let ctx = ctx();
        let credentials = Credentials {
            login: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(matches!(
            handle(ctx, credentials).await,
            Err(ApiError::BadCredentials)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_bad_credentials() {
        let ctx = ctx();
        let password_hash = auth::hash_password("hunter2").unwrap();
        ctx.store
            .create_user_with_balance("alice", &password_hash)
            .await
            .unwrap();
        let credentials = Credentials {
            login: "alice".to_string(),
            password: "wrong".to_string(),
        };
        assert!(matches!(
            handle(ctx, credentials).await,
            Err(ApiError::BadCredentials)
        ));
    }

    #[tokio::test]
    async fn correct_credentials_log_in() {
        let ctx = ctx();
        let password_hash = auth::hash_password("hunter2").unwrap();
        ctx.store
            .create_user_with_balance("alice", &password_hash)
            .await
            .unwrap();
        let credentials = Credentials {
            login: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(handle(ctx, credentials).await.is_ok());
    }
}
