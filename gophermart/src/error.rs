//! A single place mapping every domain error kind to an HTTP status and JSON body.
use serde::Serialize;
use thiserror::Error;
use warp::{
    hyper::StatusCode,
    reply::{json, with_status, Json, Reply},
};

/// A handler's success reply is boxed so it can be a plain JSON body or, for `register`/`login`,
/// a JSON body with an `authorization` header attached, both need to flow through the same
/// `Result<ApiReply, ApiError>` handler signature.
pub type ApiReply = warp::reply::Response;

/// The error kinds enumerated in the service's error handling design: business rule rejections
/// the client should see, plus the two catch-alls (`Transient`, `Fatal`) for everything else.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not valid")]
    InvalidPayload,
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("login is already taken")]
    UserAlreadyExists,
    #[error("order number is empty")]
    OrderNumberEmpty,
    #[error("order number fails the Luhn check")]
    OrderNumberInvalid,
    #[error("order was already uploaded by another user")]
    OwnedByOther,
    #[error("order or sum is missing")]
    FieldsMissing,
    #[error("balance is insufficient for this withdrawal")]
    InsufficientFunds,
    #[error("login or password is incorrect")]
    BadCredentials,
    #[error("user has no orders")]
    NoOrders,
    #[error("user has no withdrawals")]
    NoWithdrawals,
    #[error("request exceeded its deadline")]
    RequestTimeout,
    #[error("a transient failure occurred, retry the request")]
    Transient(#[source] anyhow::Error),
    #[error("an unrecoverable failure occurred")]
    Fatal(#[source] anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Fatal(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "errorType")]
    error_type: &'a str,
    description: &'a str,
}

fn body(error_type: &str, description: &str) -> Json {
    json(&ErrorBody {
        error_type,
        description,
    })
}

impl ApiError {
    /// Converts the error into the warp reply the handler should return.
    ///
    /// `Transient` and `Fatal` are logged here rather than left to the caller, so every code
    /// path that produces a 500 is guaranteed to have left a trace of why.
    pub fn into_warp_reply(self) -> ApiReply {
        match &self {
            ApiError::Transient(err) => tracing::error!(?err, "transient failure"),
            ApiError::Fatal(err) => tracing::error!(?err, "fatal failure"),
            _ => {}
        }
        let (error_type, status) = match &self {
            ApiError::InvalidPayload => ("InvalidPayload", StatusCode::BAD_REQUEST),
            ApiError::Unauthorized => ("Unauthorized", StatusCode::UNAUTHORIZED),
            ApiError::UserAlreadyExists => ("UserAlreadyExists", StatusCode::CONFLICT),
            ApiError::OrderNumberEmpty => ("OrderNumberEmpty", StatusCode::BAD_REQUEST),
            ApiError::OrderNumberInvalid => {
                ("OrderNumberInvalid", StatusCode::UNPROCESSABLE_ENTITY)
            }
            ApiError::OwnedByOther => ("OwnedByOther", StatusCode::CONFLICT),
            ApiError::FieldsMissing => ("FieldsMissing", StatusCode::BAD_REQUEST),
            ApiError::InsufficientFunds => {
                ("InsufficientFunds", StatusCode::PAYMENT_REQUIRED)
            }
            ApiError::BadCredentials => ("BadCredentials", StatusCode::UNAUTHORIZED),
            ApiError::NoOrders => ("NoOrders", StatusCode::NO_CONTENT),
            ApiError::NoWithdrawals => ("NoWithdrawals", StatusCode::NO_CONTENT),
            ApiError::RequestTimeout => ("RequestTimeout", StatusCode::SERVICE_UNAVAILABLE),
            ApiError::Transient(_) => ("InternalServerError", StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Fatal(_) => ("InternalServerError", StatusCode::INTERNAL_SERVER_ERROR),
        };
        if status == StatusCode::NO_CONTENT {
            return with_status(json(&()), status).into_response();
        }
        with_status(body(error_type, &self.to_string()), status).into_response()
    }
}
