// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Error to HTTP response mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

fn status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::CircuitOpen(_) | AppError::PoolExhausted { .. } | AppError::PoolClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AppError::Dial { .. }
        | AppError::Auth { .. }
        | AppError::Timeout(_)
        | AppError::Protocol(_)
        | AppError::Io(_) => StatusCode::BAD_GATEWAY,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::RouterDisabled(_) => StatusCode::FORBIDDEN,
        AppError::InvalidInput(_) | AppError::AddrParse(_) => StatusCode::BAD_REQUEST,
        AppError::Verification { .. } => StatusCode::CONFLICT,
        AppError::Command { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Config(_) | AppError::Cancelled | AppError::Metrics(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
