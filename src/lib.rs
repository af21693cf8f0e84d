// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! # MikroTik Gateway
//!
//! Concurrent access layer for a fleet of MikroTik RouterOS devices.
//!
//! This library speaks the RouterOS API over TCP, pools authenticated
//! connections per router, guards each router with a circuit breaker and
//! implements two workflows on top: NAT rule retargeting for PPPoE users
//! and PPPoE session queries (exact and fuzzy across routers).
//!
//! ## Main modules
//! - `activity`: fire-and-forget activity log
//! - `api`: HTTP API handlers
//! - `config`: configuration management
//! - `error`: error types
//! - `gateway`: the operations offered to callers
//! - `maintenance`: background pool cleanup
//! - `metrics`: Prometheus registry
//! - `mikrotik`: RouterOS codec, connections, pool and breakers
//! - `nat`: NAT rule manager
//! - `pppoe`: PPPoE query engine
//! - `registry`: router lookup
//! - `prelude`: commonly used types and traits

mod activity;
mod api;
mod config;
mod error;
mod gateway;
mod maintenance;
mod metrics;
mod mikrotik;
mod nat;
mod pppoe;
mod registry;
pub mod prelude;

// Re-export commonly used types
/// Application configuration
pub use config::{Config, RouterConfig, RouterSource};

/// Application error and result type
pub use error::{AppError, Result};

/// HTTP API router and state
pub use api::{AppState, ErrorResponse, create_router};

/// Gateway facade and the workflows behind it
pub use gateway::Gateway;
pub use nat::NatRuleManager;
pub use pppoe::{PppoeQueryEngine, PppoeSettings, similarity};

/// Activity log sink
pub use activity::{ActivityEvent, ActivityLog};

/// Pool maintenance loop
pub use maintenance::start_pool_maintenance;

/// Metrics registry and labels
pub use metrics::{MetricsRegistry, OperationLabels, OutcomeLabels, RouterLabels};

/// Router lookup
pub use registry::{RouterDirectory, RouterRegistry, RouterTarget};

/// RouterOS client, pool and breakers
pub use mikrotik::{
    BreakerSettings, CircuitBreakers, CircuitState, ConnectionPool, ConnectionStatus, Connector,
    ConnectorSettings, FuzzyMatch, FuzzySearch, Lease, LinkStatus, MikroTikClient, NatRule,
    NatUpdate, PoolSettings, PoolStats, PppoeSession, Reply, RouterOsConnection, Row,
};

/// RouterOS wire protocol codec (public for tests and tooling)
pub use mikrotik::{
    encode_length, encode_sentence, read_length, read_sentence, read_word, write_sentence,
};
