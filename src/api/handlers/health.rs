// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::mikrotik::CircuitState;

/// Health check endpoint response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub routers: Vec<RouterHealth>,
}

#[derive(Debug, Serialize)]
pub struct RouterHealth {
    pub id: String,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
}

/// GET /health
///
/// Routers are not contacted; the report reflects breaker state only.
/// Overall status is `degraded` while any circuit is not closed.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let breakers = state.gateway.client().breakers();
    let mut routers = Vec::with_capacity(state.router_ids.len());
    for id in &state.router_ids {
        routers.push(RouterHealth {
            id: id.clone(),
            circuit: breakers.state(id).await,
            consecutive_failures: breakers.consecutive_failures(id).await,
        });
    }

    let degraded = routers.iter().any(|r| r.circuit != CircuitState::Closed);
    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        routers,
    };

    (StatusCode::OK, Json(response))
}
