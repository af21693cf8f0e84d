// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metrics registry and update logic

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::mikrotik::{CircuitState, PoolStats};

use super::labels::{OperationLabels, OutcomeLabels, RouterLabels};

#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Mutex<Registry>>,
    // connection pool
    pool_idle: Gauge,
    pool_active: Gauge,
    // circuit breakers
    circuit_state: Family<RouterLabels, Gauge>,
    // gateway operations
    operations_total: Family<OutcomeLabels, Counter>,
    operation_duration_milliseconds: Family<OperationLabels, Gauge>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let pool_idle = Gauge::default();
        registry.register(
            "routeros_connection_pool_idle",
            "Idle RouterOS API connections across all routers",
            pool_idle.clone(),
        );
        let pool_active = Gauge::default();
        registry.register(
            "routeros_connection_pool_active",
            "RouterOS API connections currently leased",
            pool_active.clone(),
        );

        let circuit_state = Family::<RouterLabels, Gauge>::default();
        registry.register(
            "routeros_circuit_state",
            "Circuit breaker state (0=closed,1=open,2=half-open)",
            circuit_state.clone(),
        );

        let operations_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "routeros_operations",
            "Gateway operations by outcome",
            operations_total.clone(),
        );
        let operation_duration_milliseconds = Family::<OperationLabels, Gauge>::default();
        registry.register(
            "routeros_operation_duration_milliseconds",
            "Duration of the last gateway operation in milliseconds",
            operation_duration_milliseconds.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            pool_idle,
            pool_active,
            circuit_state,
            operations_total,
            operation_duration_milliseconds,
        }
    }

    /// Renders the registry in the Prometheus text format
    ///
    /// # Errors
    ///
    /// [`AppError::Metrics`] if encoding fails.
    pub async fn encode_metrics(&self) -> Result<String> {
        let registry = self.registry.lock().await;
        let mut buffer = String::new();
        encode(&mut buffer, &registry).map_err(|e| AppError::Metrics(e.to_string()))?;
        Ok(buffer)
    }

    /// Counts one operation and stores how long it took
    pub fn record_operation(&self, operation: &str, outcome: &str, elapsed: Duration) {
        self.operations_total
            .get_or_create(&OutcomeLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();

        let millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        self.operation_duration_milliseconds
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
            })
            .set(millis);
    }

    pub fn update_pool_stats(&self, stats: PoolStats) {
        #[allow(clippy::cast_possible_wrap)]
        {
            self.pool_idle.set(stats.idle as i64);
            self.pool_active.set(stats.active as i64);
        }
    }

    pub fn update_circuit_states(&self, states: &[(String, CircuitState)]) {
        for (router, state) in states {
            self.circuit_state
                .get_or_create(&RouterLabels {
                    router: router.clone(),
                })
                .set(state.as_gauge());
        }
    }
}
