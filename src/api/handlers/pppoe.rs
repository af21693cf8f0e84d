// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;
use crate::mikrotik::FuzzySearch;

const DEFAULT_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub fragment: String,
    /// Empty means every configured router
    #[serde(default)]
    pub routers: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// POST /pppoe/search
pub async fn fuzzy_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Json<FuzzySearch> {
    let routers = if request.routers.is_empty() {
        state.router_ids.as_slice()
    } else {
        request.routers.as_slice()
    };

    let cancel = state.shutdown.child_token();
    let search = state
        .gateway
        .fuzzy_search_pppoe(&request.fragment, routers, request.limit, &cancel)
        .await;
    Json(search)
}
