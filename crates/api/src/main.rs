//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::routes::AppState;
use consistency::{InMemoryPaymentGateway, PaymentGateway};
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
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
}

async fn serve<S, P>(
    config: &Config,
    state: Arc<AppState<S, P>>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("failed to install Prometheus recorder: {e}"))?;

    let engine_config = config.engine_config();
    let gateway = InMemoryPaymentGateway::new();

    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            let store = PostgresDocumentStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL document store");
            let state = api::create_state(store, gateway, engine_config, "postgres");
            serve(&config, state, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            let state =
                api::create_state(InMemoryDocumentStore::new(), gateway, engine_config, "memory");
            serve(&config, state, metrics_handle).await
        }
    }
}
