use gophermart::{
    api::{self, AppContext},
    auth::AuthSecret,
    services::{BalanceService, OrderService},
    store::postgres::PgStore,
    worker::WorkerPool,
};
use shared::accrual_client::DefaultAccrualApi;
use std::{net::ToSocketAddrs, sync::Arc};
use structopt::StructOpt;
use tokio::{sync::watch, task};

#[tokio::main]
async fn main() {
    let args = shared::arguments::Arguments::from_args();
    shared::tracing_setup::initialize(&args.log_filter);
    tracing::info!("running gophermart with {:#?}", args);

    let store = Arc::new(
        PgStore::new(&args.database_uri).expect("failed to connect to database"),
    );
    store.migrate().await.expect("failed to run migrations");

    let auth_secret = match &args.auth_secret {
        Some(secret) => AuthSecret::new(secret.clone()),
        None => {
            tracing::warn!("AUTH_SECRET not set, generating an ephemeral one for this process");
            AuthSecret::new(uuid::Uuid::new_v4().to_string())
        }
    };

    let order_service = Arc::new(OrderService::new(store.clone(), args.shard_count));
    let balance_service = Arc::new(BalanceService::new(store.clone()));

    let ctx = AppContext {
        store: store.clone(),
        order_service,
        balance_service,
        auth_secret,
        request_timeout: args.request_timeout,
    };

    let http_client = shared::http_client(args.accrual_timeout);
    let accrual = Arc::new(DefaultAccrualApi::new(
        http_client,
        args.accrual_system_address.to_string(),
    ));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let workers = WorkerPool::spawn(
        args.worker_count,
        args.shard_count,
        store,
        accrual,
        cancel_rx,
    );

    let routes = api::handle_all_routes(ctx);
    let address = args
        .run_address
        .to_socket_addrs()
        .expect("RUN_ADDRESS must be a resolvable host:port")
        .next()
        .expect("RUN_ADDRESS resolved to no addresses");
    tracing::info!(%address, "serving gophermart");
    let serve_task = task::spawn(warp::serve(routes).bind(address));

    tokio::select! {
        result = serve_task => tracing::error!(?result, "serve task exited"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received shutdown signal"),
    };

    let _ = cancel_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
}
