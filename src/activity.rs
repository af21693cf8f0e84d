// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Activity log
//!
//! Gateway operations report what they did here. Recording never blocks the
//! caller: events go through a bounded channel and are dropped when it is
//! full. The shipped consumer writes one JSON line per event under the
//! `activity` tracing target.

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// One completed gateway operation
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub operation: &'static str,
    pub router: String,
    /// Username, fragment or other operation subject
    pub subject: String,
    /// `ok` or the error kind
    pub outcome: &'static str,
    pub detail: String,
    pub duration_ms: u64,
    pub timestamp_ms: u64,
}

impl ActivityEvent {
    #[must_use]
    pub fn new(operation: &'static str, router: impl Into<String>, subject: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            operation,
            router: router.into(),
            subject: subject.into(),
            outcome: "ok",
            detail: String::new(),
            duration_ms: 0,
            timestamp_ms,
        }
    }

    #[must_use]
    pub fn took(mut self, elapsed: Duration) -> Self {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[must_use]
    pub fn failed(mut self, error: &AppError) -> Self {
        self.outcome = error.kind();
        self.detail = error.to_string();
        self
    }
}

/// Fire-and-forget handle to the activity consumer
#[derive(Debug, Clone)]
pub struct ActivityLog {
    tx: Option<mpsc::Sender<ActivityEvent>>,
}

impl ActivityLog {
    /// Starts the consumer task. It ends once every handle is dropped.
    #[must_use]
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ActivityEvent>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => tracing::info!(target: "activity", "{}", line),
                    Err(e) => tracing::warn!("Failed to serialize activity event: {}", e),
                }
            }
            tracing::debug!("Activity log consumer stopped");
        });
        (Self { tx: Some(tx) }, handle)
    }

    /// A log that discards everything
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn record(&self, event: ActivityEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            tracing::debug!("Activity event dropped: {}", e);
        }
    }
}
