// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Dial and log in to a router, retrying transient failures

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::registry::RouterTarget;

use super::connection::{READ_TIMEOUT, RouterOsConnection};

/// Retry policy for establishing connections
///
/// Attempt `n` (1-based) dials with a timeout of `dial_timeout_step * n`
/// and, if it fails, sleeps `backoff_step * n` before the next attempt.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub attempts: u32,
    pub dial_timeout_step: Duration,
    pub backoff_step: Duration,
    /// Per-command reply timeout for connections created by this connector
    pub read_timeout: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            dial_timeout_step: Duration::from_secs(15),
            backoff_step: Duration::from_secs(2),
            read_timeout: READ_TIMEOUT,
        }
    }
}

impl ConnectorSettings {
    #[must_use]
    pub fn dial_timeout(&self, attempt: u32) -> Duration {
        self.dial_timeout_step * attempt
    }

    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Creates authenticated RouterOS connections
#[derive(Debug, Clone, Default)]
pub struct Connector {
    settings: ConnectorSettings,
}

impl Connector {
    #[must_use]
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Dials `target` and logs in.
    ///
    /// Authentication failures and cancellation end the loop immediately;
    /// everything else is retried until the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// [`AppError::Auth`], [`AppError::Cancelled`], or [`AppError::Dial`]
    /// listing every failed attempt.
    pub async fn connect(
        &self,
        target: &RouterTarget,
        cancel: &CancellationToken,
    ) -> Result<RouterOsConnection> {
        let addr = target.address();
        let attempts = self.settings.attempts.max(1);
        let mut failures = Vec::with_capacity(attempts as usize);

        for attempt in 1..=attempts {
            let dial_timeout = self.settings.dial_timeout(attempt);
            tracing::debug!(
                "Connecting to {} ({}), attempt {}/{} with {:?} timeout",
                target.id,
                addr,
                attempt,
                attempts,
                dial_timeout
            );

            match self.attempt(target, &addr, dial_timeout, cancel).await {
                Ok(conn) => return Ok(conn),
                Err(e @ (AppError::Auth { .. } | AppError::Cancelled)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Connection attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        addr,
                        e
                    );
                    failures.push(format!("attempt {attempt}: {e}"));
                }
            }

            if attempt < attempts {
                let delay = self.settings.backoff(attempt);
                tracing::trace!("Backing off {:?} before next attempt to {}", delay, addr);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(AppError::Dial {
            addr,
            attempts: failures,
        })
    }

    async fn attempt(
        &self,
        target: &RouterTarget,
        addr: &str,
        dial_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RouterOsConnection> {
        let mut conn =
            RouterOsConnection::open(addr, dial_timeout, self.settings.read_timeout, cancel)
                .await?;
        tracing::trace!("Connection established, attempting login");
        match conn.login(&target.username, &target.password, cancel).await {
            Ok(()) => Ok(conn),
            Err(e) => {
                conn.close().await;
                Err(e)
            }
        }
    }
}
