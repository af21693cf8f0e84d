// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Connection pool for managing RouterOS connections
//!
//! Each router key owns a semaphore with `max_connections` permits and a
//! deque of idle connections. A permit is held for as long as a [`Lease`]
//! lives, so the number of outstanding permits is the active-lease count.
//! New connections are only dialed while holding a permit with the idle
//! deque empty, which keeps `idle + leased <= max_connections`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::registry::RouterTarget;

use super::connection::RouterOsConnection;
use super::connector::Connector;

/// Limits applied to every router's share of the pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// How long `acquire` waits for a lease to be returned
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            idle_timeout: Duration::from_secs(300), // 5 minutes
            max_lifetime: Duration::from_secs(1800),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Idle and leased connection counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub active: usize,
}

/// An authenticated connection owned by the pool
pub struct PooledConnection {
    router_key: String,
    connection: RouterOsConnection,
    created_at: Instant,
    last_used_at: Instant,
}

impl PooledConnection {
    fn expired(&self, settings: &PoolSettings, now: Instant) -> bool {
        now.duration_since(self.created_at) >= settings.max_lifetime
    }

    fn reusable(&self, settings: &PoolSettings, now: Instant) -> bool {
        !self.connection.is_broken()
            && !self.expired(settings, now)
            && now.duration_since(self.last_used_at) < settings.idle_timeout
    }
}

struct RouterSlot {
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<PooledConnection>>,
}

/// A connection checked out of the pool
///
/// Hand it back with [`ConnectionPool::release`] or
/// [`ConnectionPool::evict`]. A lease that is simply dropped (for example
/// because the caller was cancelled mid-exchange) discards its connection.
pub struct Lease {
    pooled: Option<PooledConnection>,
    slot: Arc<RouterSlot>,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    /// The leased connection
    pub fn connection(&mut self) -> &mut RouterOsConnection {
        &mut self.pooled.as_mut().expect("lease already settled").connection
    }

    #[must_use]
    pub fn router_key(&self) -> &str {
        self.pooled.as_ref().map_or("", |p| p.router_key.as_str())
    }

    /// When the underlying connection was established
    #[must_use]
    pub fn created_at(&self) -> Option<Instant> {
        self.pooled.as_ref().map(|p| p.created_at)
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("router_key", &self.router_key())
            .field("settled", &self.pooled.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(pooled) = self.pooled.take() {
            tracing::debug!(
                "Lease for {} dropped without release, discarding connection",
                pooled.router_key
            );
        }
    }
}

/// Connection pool for reusing `RouterOS` connections
pub struct ConnectionPool {
    connector: Connector,
    settings: PoolSettings,
    slots: RwLock<HashMap<String, Arc<RouterSlot>>>,
    closed: AtomicBool,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(connector: Connector, mut settings: PoolSettings) -> Self {
        settings.max_connections = settings.max_connections.max(1);
        Self {
            connector,
            settings,
            slots: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    async fn slot(&self, key: &str) -> Arc<RouterSlot> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(RouterSlot {
                    permits: Arc::new(Semaphore::new(self.settings.max_connections)),
                    idle: Mutex::new(VecDeque::new()),
                })
            })
            .clone()
    }

    async fn all_slots(&self) -> Vec<(String, Arc<RouterSlot>)> {
        self.slots
            .read()
            .await
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect()
    }

    /// Leases a connection for `target`, reusing an idle one when possible.
    ///
    /// Waits at most `acquire_timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// [`AppError::PoolExhausted`] when the wait expires,
    /// [`AppError::PoolClosed`] after shutdown, [`AppError::Cancelled`], or
    /// any error from the connector.
    pub async fn acquire(&self, target: &RouterTarget, cancel: &CancellationToken) -> Result<Lease> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::PoolClosed);
        }

        let key = target.pool_key();
        tracing::trace!("Requesting connection for key: {}", key);
        let slot = self.slot(&key).await;
        let wait = self.settings.acquire_timeout;

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            acquired = timeout(wait, slot.permits.clone().acquire_owned()) => match acquired {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(AppError::PoolClosed),
                Err(_) => {
                    tracing::warn!(
                        "No free connection for {} within {:?} ({} in use)",
                        target.id,
                        wait,
                        self.settings.max_connections
                    );
                    return Err(AppError::PoolExhausted {
                        router: target.id.clone(),
                        waited: wait,
                    });
                }
            }
        };

        let now = Instant::now();
        let mut stale = Vec::new();
        let reused = {
            let mut idle = slot.idle.lock().await;
            let mut found = None;
            while let Some(candidate) = idle.pop_back() {
                if candidate.reusable(&self.settings, now) {
                    found = Some(candidate);
                    break;
                }
                stale.push(candidate);
            }
            found
        };

        for pooled in stale {
            tracing::debug!("Connection expired for {}, removing", pooled.router_key);
            pooled.connection.close().await;
        }

        if let Some(mut pooled) = reused {
            tracing::debug!("Reusing connection from pool for {}", key);
            tracing::trace!(
                "Connection last used: {:?} ago",
                now.duration_since(pooled.last_used_at)
            );
            pooled.last_used_at = now;
            return Ok(Lease {
                pooled: Some(pooled),
                slot,
                _permit: permit,
            });
        }

        tracing::debug!("Creating new connection for {}", key);
        // The permit is dropped (and the slot freed) if this fails.
        let connection = self.connector.connect(target, cancel).await?;
        let now = Instant::now();
        Ok(Lease {
            pooled: Some(PooledConnection {
                router_key: key,
                connection,
                created_at: now,
                last_used_at: now,
            }),
            slot,
            _permit: permit,
        })
    }

    /// Returns a connection to the idle set, or closes it if it is broken,
    /// past its lifetime, or the pool is shut down.
    pub async fn release(&self, mut lease: Lease) {
        let Some(mut pooled) = lease.pooled.take() else {
            return;
        };
        let now = Instant::now();

        let discarded = if pooled.connection.is_broken() {
            Some((pooled, "connection broken"))
        } else if pooled.expired(&self.settings, now) {
            Some((pooled, "max lifetime reached"))
        } else {
            let mut idle = lease.slot.idle.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                Some((pooled, "pool shut down"))
            } else {
                tracing::debug!("Returning connection to pool for {}", pooled.router_key);
                pooled.last_used_at = now;
                idle.push_back(pooled);
                None
            }
        };

        if let Some((pooled, reason)) = discarded {
            tracing::debug!("Discarding connection to {}: {}", pooled.router_key, reason);
            pooled.connection.close().await;
        }
        // The permit goes back when `lease` drops, after the idle push.
    }

    /// Closes a connection whose protocol state can no longer be trusted
    pub async fn evict(&self, mut lease: Lease) {
        if let Some(pooled) = lease.pooled.take() {
            tracing::debug!("Evicting connection to {}", pooled.router_key);
            pooled.connection.close().await;
        }
    }

    /// Clean up expired idle connections
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut stale = Vec::new();
        for (_, slot) in self.all_slots().await {
            let mut idle = slot.idle.lock().await;
            let (keep, expired): (VecDeque<_>, VecDeque<_>) = idle
                .drain(..)
                .partition(|pooled| pooled.reusable(&self.settings, now));
            *idle = keep;
            stale.extend(expired);
        }
        for pooled in stale {
            tracing::debug!("Cleaning up expired connection: {}", pooled.router_key);
            pooled.connection.close().await;
        }
    }

    /// Closes every idle connection and refuses further leases.
    ///
    /// Waiters blocked in `acquire` fail with [`AppError::PoolClosed`];
    /// leases still in flight are closed when they are released.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut drained = Vec::new();
        for (_, slot) in self.all_slots().await {
            slot.permits.close();
            drained.extend(slot.idle.lock().await.drain(..));
        }
        let count = drained.len();
        for pooled in drained {
            pooled.connection.close().await;
        }
        tracing::info!("Connection pool shut down, closed {} idle connection(s)", count);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Counts for one router key (see [`RouterTarget::pool_key`])
    pub async fn router_stats(&self, key: &str) -> PoolStats {
        let Some(slot) = self.slots.read().await.get(key).cloned() else {
            return PoolStats::default();
        };
        self.slot_stats(&slot).await
    }

    /// Get pool statistics for metrics
    pub async fn stats(&self) -> PoolStats {
        let mut total = PoolStats::default();
        for (_, slot) in self.all_slots().await {
            let stats = self.slot_stats(&slot).await;
            total.idle += stats.idle;
            total.active += stats.active;
        }
        total
    }

    async fn slot_stats(&self, slot: &RouterSlot) -> PoolStats {
        let idle = slot.idle.lock().await.len();
        let active = self
            .settings
            .max_connections
            .saturating_sub(slot.permits.available_permits());
        PoolStats { idle, active }
    }
}
