//! # shiftwise-api — Axum API Services for Shiftwise
//!
//! Workforce scheduling over HTTP. At its core are two contention-safe
//! services: the [`ledger::ClaimLedger`], where the first of any number of
//! concurrent claims on an open cover-up wins, and the
//! [`arbitrator::SwapArbitrator`], which decides each shift-swap proposal
//! exactly once and moves both shifts in the same step as an approval.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                        | Domain               |
//! |------------------------|-------------------------------|----------------------|
//! | `/v1/cover-ups/*`      | [`routes::cover_ups`]         | Claim ledger         |
//! | `/v1/swaps/*`          | [`routes::swaps`]             | Swap arbitration     |
//! | `/v1/employees/*`      | [`routes::employees`]         | Accounts             |
//! | `/v1/shifts/*`         | [`routes::shifts`]            | Schedule             |
//! | `/v1/attendance/*`     | [`routes::attendance`]        | Clock-in/out         |
//! | `/v1/leaves/*`         | [`routes::leaves`]            | Leave requests       |
//! | `/v1/payroll/*`        | [`routes::payroll`]           | Payroll runs         |
//! | `/v1/announcements/*`  | [`routes::announcements`]     | Announcements        |
//! | `/v1/inquiries/*`      | [`routes::inquiries`]         | Employee inquiries   |
//! | `/v1/notifications/*`  | [`routes::notifications`]     | Inbox                |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! `/health/*` and `/metrics` are mounted outside authentication.

pub mod arbitrator;
pub mod auth;
pub mod concurrency;
pub mod db;
pub mod error;
pub mod extractors;
pub mod ledger;
pub mod middleware;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod schedule;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`) and `/metrics` are mounted outside the auth
/// middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::cover_ups::router())
        .merge(routes::swaps::router())
        .merge(routes::employees::router())
        .merge(routes::shifts::router())
        .merge(routes::attendance::router())
        .merge(routes::leaves::router())
        .merge(routes::payroll::router())
        .merge(routes::announcements::router())
        .merge(routes::inquiries::router())
        .merge(routes::notifications::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated health checks and scrape endpoint.
    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new().merge(ops).merge(api)
}

/// Liveness check — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check — 200 once the database (if configured) answers.
async fn readiness(State(state): State<AppState>) -> Response {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response();
        }
    }
    "ready".into_response()
}

/// Prometheus text exposition, or 404 when metrics are disabled.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
