// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! HTTP API module for MikroTik Gateway
//!
//! Thin JSON adapter over the [`Gateway`] operations.
//!
//! # Endpoints
//! - `GET /health` — health check
//! - `GET /metrics` — Prometheus metrics
//! - `POST /routers/{id}/test` — connectivity probe
//! - `PUT /routers/{id}/nat` — retarget a PPPoE user's NAT rule
//! - `GET /routers/{id}/pppoe/{username}` — PPPoE session status
//! - `POST /pppoe/search` — fuzzy username search across routers

mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::gateway::Gateway;

pub use error::ErrorResponse;

/// Application state shared with endpoints
pub struct AppState {
    pub gateway: Gateway,
    /// Routers searched when a request names none
    pub router_ids: Vec<String>,
    /// Parent of every per-request token
    pub shutdown: CancellationToken,
}

/// Creates the main Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/routers/{id}/test", post(handlers::test_connection))
        .route("/routers/{id}/nat", put(handlers::update_nat_rule))
        .route(
            "/routers/{id}/pppoe/{username}",
            get(handlers::check_pppoe_status),
        )
        .route("/pppoe/search", post(handlers::fuzzy_search))
        .with_state(state)
}
