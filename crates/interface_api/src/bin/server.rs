//! Balance service - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run against PostgreSQL
//! API_DATABASE_URL=postgres://localhost/balance cargo run --bin balance-api
//!
//! # Run with the in-memory store
//! API_STORAGE=memory cargo run --bin balance-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `API_STORAGE` - `postgres` or `memory` (default: postgres)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_LOG_LEVEL` - Log filter when `RUST_LOG` is unset (default: info)
//! * `API_LOG_JSON` - Emit JSON logs (default: false)
//! * `API_PUBLIC_BASE_URL` - Base of returned report links
//! * `API_REPORT_DIR` - Report file directory (default: ./reports)
//! * `API_REPORT_RETENTION` - `keep_history` or `single_slot`
//! * `API_REPORT_TIMEZONE` - IANA zone for report months (default: UTC)
//! * `API_LOCK_TIMEOUT_MS` - Lock and transaction wait bound (default: 5000)
//! * `API_DEFAULT_PAGE_LIMIT` - History row cap without paging (default: 1000)
//! * `API_RESERVATION_TTL_SECS` - Release reservations older than this
//! * `API_REAPER_INTERVAL_SECS` - Reaper period (default: 60)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use core_kernel::HealthCheckable;
use domain_ledger::adapters::{FilesystemArtifactStore, InMemoryLedgerStore, InMemoryReportRegistry};
use domain_ledger::{LedgerEngine, LedgerStore, ReportGenerator, ReportRegistry, ReservationReaper};
use infra_db::{create_pool, run_migrations, PostgresLedgerStore, PostgresReportRegistry};
use interface_api::config::{ApiConfig, StorageBackend};
use interface_api::{create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Storage adapters selected by configuration
struct Storage {
    ledger: Arc<dyn LedgerStore>,
    registry: Arc<dyn ReportRegistry>,
    health: Arc<dyn HealthCheckable>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API_* configuration")?;

    init_tracing(&config.log_level, config.log_json);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Starting balance service API server"
    );

    let storage = open_storage(&config).await?;
    let ledger_config = config.to_ledger_config();

    let engine = Arc::new(LedgerEngine::new(storage.ledger.clone(), ledger_config.clone()));
    let artifacts = FilesystemArtifactStore::new(&config.report_dir)
        .await
        .context("failed to prepare report directory")?;
    let reports = Arc::new(ReportGenerator::new(
        storage.ledger.clone(),
        Arc::new(artifacts),
        storage.registry.clone(),
        &ledger_config,
    ));

    let reaper = ledger_config.reservation_ttl.map(|ttl| {
        tracing::info!(ttl_secs = ttl.as_secs(), "Starting reservation reaper");
        ReservationReaper::new(engine.clone(), ttl)
            .with_interval(Duration::from_secs(config.reaper_interval_secs.max(1)))
            .spawn()
    });

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("invalid API_HOST/API_PORT")?;

    let state = AppState::new(engine, reports, config).with_health_checks(vec![storage.health]);
    let app = create_router(state);

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = reaper {
        handle.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over `log_level`.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

async fn open_storage(config: &ApiConfig) -> anyhow::Result<Storage> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; balances are lost on restart");
            let store = Arc::new(InMemoryLedgerStore::new());
            Ok(Storage {
                ledger: store.clone(),
                registry: Arc::new(InMemoryReportRegistry::new()),
                health: store,
            })
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(config.to_database_config())
                .await
                .context("failed to connect to database")?;
            run_migrations(&pool)
                .await
                .context("failed to apply migrations")?;

            let store = Arc::new(PostgresLedgerStore::new(pool.clone()));
            Ok(Storage {
                ledger: store.clone(),
                registry: Arc::new(PostgresReportRegistry::new(pool)),
                health: store,
            })
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
