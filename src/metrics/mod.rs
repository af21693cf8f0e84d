// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prometheus metrics for the gateway
//!
//! Pool occupancy, breaker states and per-operation outcomes.

mod labels;
mod registry;

pub use labels::{OperationLabels, OutcomeLabels, RouterLabels};

/// Prometheus metrics registry
pub use registry::MetricsRegistry;
