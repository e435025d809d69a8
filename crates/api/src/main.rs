//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config};
use domain::{EngineContext, LogNotifier};
use fanout::{BroadcastHub, FanOut};
use gateway::VnpayGateway;
use jobs::SweepConfig;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
    token.cancel();
}

async fn open_store(config: &Config) -> Arc<dyn Store> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if !config.vnpay.is_configured() {
        tracing::warn!("VNP_TMN_CODE or VNP_HASH_SECRET missing, gateway payments will fail");
    }

    // 3. Wire the engines
    let store = open_store(&config).await;
    let hub = BroadcastHub::new(fanout::hub::DEFAULT_CAPACITY);
    let ctx = EngineContext::new(store, Arc::new(VnpayGateway::new(config.vnpay.clone())))
        .with_fanout(FanOut::new(Arc::new(hub)))
        .with_notifier(Arc::new(LogNotifier));

    // 4. Start the background sweeps
    let shutdown = CancellationToken::new();
    let sweepers = jobs::spawn_all(ctx.clone(), SweepConfig::default(), shutdown.clone());

    // 5. Build the application
    let state = Arc::new(AppState::new(ctx, config.client_url.clone()));
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .expect("server error");

    shutdown.cancel();
    for sweeper in sweepers {
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "sweeper task failed");
        }
    }

    tracing::info!("server shut down gracefully");
}
