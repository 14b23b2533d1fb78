//! Auth gate (C9): password hashing, bearer token issuance/verification, and the warp filter
//! that injects the authenticated username into a handler's arguments.
//!
//! The identity never lives in a process-wide global, it is threaded through as an ordinary
//! filter-extracted function parameter, the request-scope mechanism called for by the design.
use crate::error::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use model::Claims;
use std::{sync::Arc, time::Duration};
use warp::{reject::Reject, Filter, Rejection};

/// Bearer tokens are valid for five minutes from issuance.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct AuthSecret(Arc<str>);

impl AuthSecret {
    pub fn new(secret: String) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

#[derive(Debug)]
struct Unauthenticated;
impl Reject for Unauthenticated {}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Fatal(anyhow::anyhow!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| ApiError::Fatal(anyhow::anyhow!("stored password hash is malformed: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::BadCredentials)
}

/// Issues a bearer token for `username`, expiring [`TOKEN_LIFETIME`] from now.
pub fn issue(secret: &AuthSecret, username: &str) -> Result<String, ApiError> {
    let exp = (chrono::Utc::now() + chrono::Duration::from_std(TOKEN_LIFETIME).unwrap())
        .timestamp();
    let claims = Claims {
        username: username.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Fatal(anyhow::anyhow!("token signing failed: {err}")))
}

pub fn verify(secret: &AuthSecret, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

/// Extracts the bearer token from `Authorization`, verifies it, and yields the authenticated
/// username to the wrapped handler.
pub fn require_user(
    secret: AuthSecret,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            let token = header
                .as_deref()
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or_else(|| warp::reject::custom(Unauthenticated))?;
            verify(&secret, token)
                .map(|claims| claims.username)
                .map_err(|_| warp::reject::custom(Unauthenticated))
        }
    })
}

pub async fn handle_auth_rejection(err: Rejection) -> Result<warp::reply::Response, Rejection> {
    if err.find::<Unauthenticated>().is_some() {
        return Ok(warp::reply::Reply::into_response(
            ApiError::Unauthorized.into_warp_reply(),
        ));
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(ApiError::BadCredentials)
        ));
    }

    #[test]
    fn token_round_trips() {
        let secret = AuthSecret::new("test-secret".to_string());
        let token = issue(&secret, "alice").unwrap();
        let claims = verify(&secret, &token).unwrap();
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = issue(&AuthSecret::new("a".to_string()), "alice").unwrap();
        assert!(matches!(
            verify(&AuthSecret::new("b".to_string()), &token),
            Err(ApiError::Unauthorized)
        ));
    }
}
