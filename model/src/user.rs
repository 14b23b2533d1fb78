use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// Wire shape of `/api/user/register` and `/api/user/login` request bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// JWT claims: a 5-minute bearer token carrying only the identity it authenticates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub exp: i64,
}
