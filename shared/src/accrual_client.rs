//! Client for the external accrual calculation system (`GET /api/orders/{number}`).
use model::order::OrderStatus;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
const MAX_CONNECTION_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Mockable so worker tests can run without a live accrual system.
#[mockall::automock]
#[async_trait::async_trait]
pub trait AccrualApi: Send + Sync {
    async fn fetch(&self, order_number: &str) -> Result<AccrualOutcome, AccrualError>;
}

pub struct DefaultAccrualApi {
    pub client: Client,
    pub base_url: String,
}

impl DefaultAccrualApi {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccrualOutcome {
    /// The accrual system knows this order and reported a status/accrual pair.
    Known(AccrualResponse),
    /// The accrual system has never seen this order (`204 No Content`).
    NotRegistered,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    accrual: f64,
}

impl AccrualResponse {
    /// The accrual system reports amounts as JSON floats; we keep `Decimal` everywhere else,
    /// so convert at the boundary rather than let the float leak into the domain model.
    pub fn accrual(&self) -> rust_decimal::Decimal {
        rust_decimal::Decimal::from_f64_retain(self.accrual).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl From<AccrualStatus> for OrderStatus {
    fn from(status: AccrualStatus) -> Self {
        match status {
            // The accrual system's REGISTERED means "accepted but not yet started";
            // from our side that is indistinguishable from PROCESSING.
            AccrualStatus::Registered => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("error sending request to accrual system: {0}")]
    Send(#[source] reqwest::Error),
    #[error("error decoding accrual system response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("accrual system returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

#[async_trait::async_trait]
impl AccrualApi for DefaultAccrualApi {
    async fn fetch(&self, order_number: &str) -> Result<AccrualOutcome, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base_url, order_number);
        let mut backoff = INITIAL_BACKOFF;
        let mut connection_attempt = 0u32;
        let mut rate_limit_retried = false;
        loop {
            tracing::debug!(%url, "querying accrual system");
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(err) if err.is_connect() || err.is_timeout() => {
                    if connection_attempt >= MAX_CONNECTION_RETRIES {
                        return Err(AccrualError::Send(err));
                    }
                    connection_attempt += 1;
                    tracing::warn!(?err, ?backoff, connection_attempt, "accrual system unreachable, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
                Err(err) => return Err(AccrualError::Send(err)),
            };

            match response.status() {
                StatusCode::OK => {
                    let body: AccrualResponse =
                        response.json().await.map_err(AccrualError::Decode)?;
                    tracing::debug!(order = %body.order, status = ?body.status, accrual = %body.accrual, "accrual response");
                    return Ok(AccrualOutcome::Known(body));
                }
                StatusCode::NO_CONTENT => return Ok(AccrualOutcome::NotRegistered),
                StatusCode::TOO_MANY_REQUESTS => {
                    if rate_limit_retried {
                        return Err(AccrualError::UnexpectedStatus(StatusCode::TOO_MANY_REQUESTS));
                    }
                    rate_limit_retried = true;
                    let delay = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                    tracing::debug!(?delay, "accrual system rate limited us, retrying once");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                other => return Err(AccrualError::UnexpectedStatus(other)),
            }
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    let header = response.headers().get(reqwest::header::RETRY_AFTER)?;
    let seconds: u64 = header.to_str().ok()?.parse().ok()?;
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_maps_to_processing() {
        assert_eq!(
            OrderStatus::from(AccrualStatus::Registered),
            OrderStatus::Processing
        );
    }

    #[test]
    fn processed_maps_to_processed() {
        assert_eq!(
            OrderStatus::from(AccrualStatus::Processed),
            OrderStatus::Processed
        );
    }
}
