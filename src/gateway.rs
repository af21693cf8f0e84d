// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Gateway facade
//!
//! The four operations offered to callers. Each one is timed, counted in the
//! metrics registry and reported to the activity log.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::activity::{ActivityEvent, ActivityLog};
use crate::error::Result;
use crate::metrics::MetricsRegistry;
use crate::mikrotik::{
    CircuitBreakers, ConnectionPool, ConnectionStatus, FuzzySearch, LinkStatus, MikroTikClient,
    NatUpdate, PppoeSession,
};
use crate::nat::NatRuleManager;
use crate::pppoe::{PppoeQueryEngine, PppoeSettings};
use crate::registry::RouterDirectory;

#[derive(Clone)]
pub struct Gateway {
    client: MikroTikClient,
    nat: NatRuleManager,
    pppoe: PppoeQueryEngine,
    activity: ActivityLog,
    metrics: MetricsRegistry,
}

impl Gateway {
    #[must_use]
    pub fn new(
        registry: Arc<dyn RouterDirectory>,
        pool: Arc<ConnectionPool>,
        breakers: Arc<CircuitBreakers>,
        pppoe: PppoeSettings,
        activity: ActivityLog,
        metrics: MetricsRegistry,
    ) -> Self {
        let client = MikroTikClient::new(registry, pool, breakers);
        Self {
            nat: NatRuleManager::new(client.clone()),
            pppoe: PppoeQueryEngine::new(client.clone(), pppoe),
            client,
            activity,
            metrics,
        }
    }

    #[must_use]
    pub fn client(&self) -> &MikroTikClient {
        &self.client
    }

    #[must_use]
    pub fn nat(&self) -> &NatRuleManager {
        &self.nat
    }

    #[must_use]
    pub fn pppoe(&self) -> &PppoeQueryEngine {
        &self.pppoe
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Copies pool occupancy and breaker states into the metrics registry
    pub async fn refresh_metrics(&self) {
        self.metrics.update_pool_stats(self.client.pool().stats().await);
        self.metrics
            .update_circuit_states(&self.client.breakers().snapshot().await);
    }

    /// Probes a router's reachability
    ///
    /// # Errors
    ///
    /// Unknown or disabled router.
    pub async fn test_connection(
        &self,
        router_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ConnectionStatus> {
        let started = Instant::now();
        let result = self.client.test_connection(router_id, cancel).await;
        self.observe("test_connection", router_id, "", started, &result, |status| {
            match status.status {
                LinkStatus::Connected => format!(
                    "connected, RouterOS {}",
                    status.version.as_deref().unwrap_or("unknown")
                ),
                LinkStatus::Disconnected => format!("disconnected: {}", status.message),
            }
        });
        result
    }

    /// Moves the NAT rule of a PPPoE user to a new destination
    ///
    /// # Errors
    ///
    /// Registry, breaker, connection, lookup and verification errors.
    pub async fn update_nat_rule(
        &self,
        router_id: &str,
        username: &str,
        new_ip: IpAddr,
        new_port: u16,
        cancel: &CancellationToken,
    ) -> Result<NatUpdate> {
        let started = Instant::now();
        let result = self
            .nat
            .retarget_user(router_id, username, new_ip, new_port, cancel)
            .await;
        self.observe("update_nat_rule", router_id, username, started, &result, |update| {
            format!(
                "{}: {} -> {}",
                update.rule_id, update.old_destination, update.new_destination
            )
        });
        result
    }

    /// Active PPPoE session of `username`, if online
    ///
    /// # Errors
    ///
    /// Registry, breaker and connection errors.
    pub async fn check_pppoe_status(
        &self,
        router_id: &str,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PppoeSession>> {
        let started = Instant::now();
        let result = self.pppoe.check_status(router_id, username, cancel).await;
        self.observe("check_pppoe_status", router_id, username, started, &result, |session| {
            match session {
                Some(s) => format!("online at {} for {}", s.address, s.uptime),
                None => "offline".to_string(),
            }
        });
        result
    }

    /// Searches several routers for usernames resembling `fragment`
    pub async fn fuzzy_search_pppoe(
        &self,
        fragment: &str,
        router_ids: &[String],
        limit: usize,
        cancel: &CancellationToken,
    ) -> FuzzySearch {
        let started = Instant::now();
        let search = self
            .pppoe
            .fuzzy_search(fragment, router_ids, limit, cancel)
            .await;
        let elapsed = started.elapsed();

        let outcome = if search.errors.is_empty() { "ok" } else { "partial" };
        self.metrics
            .record_operation("fuzzy_search_pppoe", outcome, elapsed);
        self.activity.record(
            ActivityEvent::new("fuzzy_search_pppoe", router_ids.join(","), fragment)
                .took(elapsed)
                .detail(format!(
                    "{} match(es), {} router error(s)",
                    search.matches.len(),
                    search.errors.len()
                )),
        );
        search
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        router_id: &str,
        subject: &str,
        started: Instant,
        result: &Result<T>,
        describe: impl FnOnce(&T) -> String,
    ) {
        let elapsed = started.elapsed();
        let event = ActivityEvent::new(operation, router_id, subject).took(elapsed);
        let event = match result {
            Ok(value) => {
                self.metrics.record_operation(operation, "ok", elapsed);
                event.detail(describe(value))
            }
            Err(e) => {
                self.metrics.record_operation(operation, e.kind(), elapsed);
                event.failed(e)
            }
        };
        self.activity.record(event);
    }
}
