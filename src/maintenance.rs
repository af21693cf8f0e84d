// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Background pool maintenance
//!
//! Periodically drops idle connections that outlived their idle timeout or
//! maximum lifetime, then refreshes the pool and breaker gauges.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::gateway::Gateway;

/// Spawns the maintenance loop; it stops when `shutdown` is cancelled
pub fn start_pool_maintenance(
    gateway: Gateway,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tracing::debug!("Starting connection pool maintenance every {:?}", interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("Stopping connection pool maintenance");
                    break;
                }
                _ = ticker.tick() => {
                    gateway.client().pool().cleanup().await;
                    gateway.refresh_metrics().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use crate::metrics::MetricsRegistry;
    use crate::mikrotik::{BreakerSettings, CircuitBreakers, ConnectionPool, Connector, PoolSettings};
    use crate::pppoe::PppoeSettings;
    use crate::registry::RouterRegistry;
    use std::sync::Arc;

    fn gateway() -> Gateway {
        Gateway::new(
            Arc::new(RouterRegistry::new(vec![])),
            Arc::new(ConnectionPool::new(Connector::default(), PoolSettings::default())),
            Arc::new(CircuitBreakers::new(BreakerSettings::default())),
            PppoeSettings::default(),
            ActivityLog::disabled(),
            MetricsRegistry::new(),
        )
    }

    #[tokio::test]
    async fn test_maintenance_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = start_pool_maintenance(gateway(), Duration::from_millis(10), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("maintenance task did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_maintenance_refreshes_pool_gauges() {
        let gateway = gateway();
        let shutdown = CancellationToken::new();
        let handle = start_pool_maintenance(gateway.clone(), Duration::from_millis(10), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let text = gateway.metrics().encode_metrics().await.unwrap();
        assert!(text.contains("routeros_connection_pool_idle 0"));
    }
}
