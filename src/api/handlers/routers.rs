// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Per-router endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::mikrotik::{ConnectionStatus, NatUpdate, PppoeSession};

#[derive(Debug, Serialize, Deserialize)]
pub struct NatRequest {
    pub username: String,
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct PppoeStatusResponse {
    pub username: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<PppoeSession>,
}

/// POST /routers/{id}/test
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(router_id): Path<String>,
) -> Result<Json<ConnectionStatus>> {
    let cancel = state.shutdown.child_token();
    let status = state.gateway.test_connection(&router_id, &cancel).await?;
    Ok(Json(status))
}

/// PUT /routers/{id}/nat
pub async fn update_nat_rule(
    State(state): State<Arc<AppState>>,
    Path(router_id): Path<String>,
    Json(request): Json<NatRequest>,
) -> Result<Json<NatUpdate>> {
    let ip: IpAddr = request
        .ip
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("'{}' is not an IP address", request.ip)))?;
    if request.port == 0 {
        return Err(AppError::InvalidInput("port cannot be 0".to_string()));
    }

    let cancel = state.shutdown.child_token();
    let update = state
        .gateway
        .update_nat_rule(&router_id, &request.username, ip, request.port, &cancel)
        .await?;
    Ok(Json(update))
}

/// GET /routers/{id}/pppoe/{username}
pub async fn check_pppoe_status(
    State(state): State<Arc<AppState>>,
    Path((router_id, username)): Path<(String, String)>,
) -> Result<Json<PppoeStatusResponse>> {
    let cancel = state.shutdown.child_token();
    let session = state
        .gateway
        .check_pppoe_status(&router_id, &username, &cancel)
        .await?;
    Ok(Json(PppoeStatusResponse {
        username,
        online: session.is_some(),
        session,
    }))
}
