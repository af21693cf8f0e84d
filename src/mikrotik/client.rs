// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! High-level MikroTik client
//!
//! Every router operation goes through [`MikroTikClient::with_connection`]:
//! registry lookup, circuit breaker admission, pooled lease, then the
//! caller's exchange. Faulty connections are evicted and the breaker sees
//! exactly one outcome per call.

use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::registry::{RouterDirectory, RouterTarget};

use super::breaker::CircuitBreakers;
use super::connection::RouterOsConnection;
use super::pool::ConnectionPool;
use super::types::{ConnectionStatus, LinkStatus};

/// `MikroTik` `RouterOS` API client shared by the NAT and PPPoE workflows
#[derive(Clone)]
pub struct MikroTikClient {
    registry: Arc<dyn RouterDirectory>,
    pool: Arc<ConnectionPool>,
    breakers: Arc<CircuitBreakers>,
}

impl MikroTikClient {
    #[must_use]
    pub fn new(
        registry: Arc<dyn RouterDirectory>,
        pool: Arc<ConnectionPool>,
        breakers: Arc<CircuitBreakers>,
    ) -> Self {
        Self {
            registry,
            pool,
            breakers,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakers> {
        &self.breakers
    }

    /// Looks a router up in the registry
    ///
    /// # Errors
    ///
    /// Propagates `NotFound` / `RouterDisabled` from the registry.
    pub fn resolve(&self, router_id: &str) -> Result<RouterTarget> {
        self.registry.router_target(router_id)
    }

    /// Runs `op` on a pooled connection to `target`, guarded by the
    /// router's circuit breaker.
    pub(crate) async fn with_connection<T, F>(
        &self,
        target: &RouterTarget,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut RouterOsConnection) -> BoxFuture<'c, Result<T>>,
    {
        self.with_deadline(target, cancel, None, op).await
    }

    /// Like [`Self::with_connection`], with the lease and exchange bounded
    /// by `deadline`.
    ///
    /// The deadline runs inside the breaker call, so a router that stops
    /// answering is charged a `Timeout` failure. The in-flight lease is
    /// dropped and its connection discarded.
    pub(crate) async fn with_deadline<T, F>(
        &self,
        target: &RouterTarget,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
        op: F,
    ) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut RouterOsConnection) -> BoxFuture<'c, Result<T>>,
    {
        self.breakers
            .call(&target.id, async {
                let exchange = async {
                    let mut lease = self.pool.acquire(target, cancel).await?;
                    let result = op(lease.connection()).await;
                    match &result {
                        Err(e) if e.is_connection_fault() => {
                            tracing::debug!(
                                "Evicting connection to {} after error: {}",
                                target.id,
                                e
                            );
                            self.pool.evict(lease).await;
                        }
                        _ => self.pool.release(lease).await,
                    }
                    result
                };

                let Some(limit) = deadline else {
                    return exchange.await;
                };
                match tokio::time::timeout(limit, exchange).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("Router {} did not answer within {:?}", target.id, limit);
                        Err(AppError::Timeout(format!(
                            "router '{}' did not answer within {limit:?}",
                            target.id
                        )))
                    }
                }
            })
            .await
    }

    /// Probes a router: identity and RouterOS version.
    ///
    /// Connection problems are reported as `disconnected`, not as errors.
    ///
    /// # Errors
    ///
    /// Only registry errors (unknown or disabled router).
    pub async fn test_connection(
        &self,
        router_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ConnectionStatus> {
        let target = self.resolve(router_id)?;
        let token = cancel.clone();

        let probed = self
            .with_connection(&target, cancel, move |conn| {
                async move {
                    let identity = conn.command(&token, "/system/identity/print", &[]).await?;
                    let resource = conn.command(&token, "/system/resource/print", &[]).await?;
                    Ok((
                        identity.rows.first().and_then(|r| r.get("name")).map(str::to_string),
                        resource.rows.first().and_then(|r| r.get("version")).map(str::to_string),
                    ))
                }
                .boxed()
            })
            .await;

        Ok(match probed {
            Ok((identity, version)) => {
                tracing::debug!("Router {} reachable at {}", target.id, target.address());
                ConnectionStatus {
                    status: LinkStatus::Connected,
                    identity,
                    version,
                    message: format!("Connected to {}", target.address()),
                }
            }
            Err(e) => {
                tracing::warn!("Router {} unreachable: {}", target.id, e);
                ConnectionStatus {
                    status: LinkStatus::Disconnected,
                    identity: None,
                    version: None,
                    message: e.to_string(),
                }
            }
        })
    }
}
