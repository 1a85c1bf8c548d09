//! HTTP API Layer
//!
//! REST surface of the balance service using Axum. Handlers are thin: they
//! parse the request, call the [`LedgerEngine`] or [`ReportGenerator`], and
//! map [`LedgerError`](domain_ledger::LedgerError) onto status codes.
//!
//! # Architecture
//!
//! - **Handlers**: users and balances, reservations, reports, health
//! - **Middleware**: request id and request logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: `{error, code, message}` bodies
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(engine, reports, config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use core_kernel::HealthCheckable;
use domain_ledger::{LedgerEngine, ReportGenerator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{health, reports, reservations, users};
use crate::middleware::request_logging;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LedgerEngine>,
    pub reports: Arc<ReportGenerator>,
    pub config: Arc<ApiConfig>,
    /// Adapters polled by the readiness check
    pub health: Arc<Vec<Arc<dyn HealthCheckable>>>,
}

impl AppState {
    pub fn new(engine: Arc<LedgerEngine>, reports: Arc<ReportGenerator>, config: ApiConfig) -> Self {
        Self {
            engine,
            reports,
            config: Arc::new(config),
            health: Arc::new(Vec::new()),
        }
    }

    pub fn with_health_checks(mut self, checks: Vec<Arc<dyn HealthCheckable>>) -> Self {
        self.health = Arc::new(checks);
        self
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let api_routes = Router::new()
        .route("/api/users/", post(users::register_user))
        .route("/api/users/accrual/", post(users::accrual))
        .route("/api/users/withdraw/", post(users::withdraw))
        .route("/api/users/transaction/", post(users::transfer))
        .route("/api/users/reserve/", post(reservations::reserve))
        .route("/api/users/accept/", post(reservations::accept))
        .route("/api/users/release/", post(reservations::release))
        .route("/api/users/balance/:id", get(users::get_balance))
        .route("/api/users/report/", get(users::get_user_report))
        .route("/api/report/create/", post(reports::create_report))
        .route("/api/report/:hash", get(reports::get_report));

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        // Applied innermost-first; equivalent to a ServiceBuilder of
        // Cors -> Trace -> request_logging (outermost to innermost).
        .layer(axum_middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
