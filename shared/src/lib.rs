pub mod accrual_client;
pub mod arguments;
pub mod tracing_setup;

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// The standard http client used by the accrual client and any other outbound caller.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .timeout(timeout)
        .user_agent("gophermart/1.0")
        .build()
        .unwrap()
}

/// Run a future and callback with the time the future took.
pub async fn measure_time<T>(future: impl Future<Output = T>, timer: impl FnOnce(Duration)) -> T {
    let start = Instant::now();
    let result = future.await;
    timer(start.elapsed());
    result
}
