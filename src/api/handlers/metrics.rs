// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::AppState;

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    state.gateway.refresh_metrics().await;
    match state.gateway.metrics().encode_metrics().await {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(
                "Content-Type",
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            e.into_response()
        }
    }
}
