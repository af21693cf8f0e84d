// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Per-router circuit breaker
//!
//! Closed -> Open after `failure_threshold` consecutive failures; Open fails
//! fast until `open_timeout` has elapsed; then a single trial call is let
//! through (HalfOpen). The trial's outcome closes the circuit or re-opens it
//! with a fresh timer.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the metrics gauge
    #[must_use]
    pub fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// How a finished call is reported to the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    /// The router was never judged (caller cancelled, pool saturated)
    Neutral,
}

impl Outcome {
    pub(crate) fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) if e.is_router_fault() => Self::Failure,
            Err(e) if e.is_caller_side() => Self::Neutral,
            Err(_) => Self::Success,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn open_elapsed(&self, open_timeout: Duration) -> bool {
        self.opened_at
            .is_none_or(|opened| opened.elapsed() >= open_timeout)
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial_in_flight = false;
    }
}

fn lock(state: &Mutex<BreakerState>) -> MutexGuard<'_, BreakerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Permission to run one call; reports `Neutral` if dropped unsettled
struct Admission {
    key: String,
    state: Arc<Mutex<BreakerState>>,
    settings: BreakerSettings,
    trial: bool,
    settled: bool,
}

impl Admission {
    fn finish(mut self, outcome: Outcome) {
        self.settled = true;
        let mut st = lock(&self.state);
        match outcome {
            Outcome::Success => {
                if self.trial {
                    tracing::info!("Circuit for {} closed after successful trial", self.key);
                    st.state = CircuitState::Closed;
                    st.consecutive_failures = 0;
                    st.opened_at = None;
                    st.trial_in_flight = false;
                } else if st.state == CircuitState::Closed {
                    st.consecutive_failures = 0;
                }
            }
            Outcome::Failure => {
                if self.trial {
                    st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                    tracing::warn!("Trial call to {} failed, circuit re-opened", self.key);
                    st.open();
                } else if st.state == CircuitState::Closed {
                    st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                    tracing::debug!(
                        "Failure recorded for {}, consecutive failures: {}",
                        self.key,
                        st.consecutive_failures
                    );
                    if st.consecutive_failures >= self.settings.failure_threshold {
                        tracing::warn!(
                            "Circuit for {} opened after {} consecutive failures",
                            self.key,
                            st.consecutive_failures
                        );
                        st.open();
                    }
                }
            }
            Outcome::Neutral => {
                if self.trial {
                    st.trial_in_flight = false;
                }
            }
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            tracing::debug!("Trial call to {} abandoned", self.key);
            lock(&self.state).trial_in_flight = false;
        }
    }
}

/// Circuit breakers keyed by router id
pub struct CircuitBreakers {
    settings: BreakerSettings,
    states: RwLock<HashMap<String, Arc<Mutex<BreakerState>>>>,
}

impl CircuitBreakers {
    #[must_use]
    pub fn new(mut settings: BreakerSettings) -> Self {
        settings.failure_threshold = settings.failure_threshold.max(1);
        Self {
            settings,
            states: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    async fn entry(&self, key: &str) -> Arc<Mutex<BreakerState>> {
        if let Some(state) = self.states.read().await.get(key) {
            return state.clone();
        }
        self.states
            .write()
            .await
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BreakerState::new())))
            .clone()
    }

    /// Whether a call for `key` would currently be admitted
    pub async fn is_available(&self, key: &str) -> bool {
        let Some(state) = self.states.read().await.get(key).cloned() else {
            return true;
        };
        let st = lock(&state);
        match st.state {
            CircuitState::Closed => true,
            CircuitState::Open => st.open_elapsed(self.settings.open_timeout),
            CircuitState::HalfOpen => !st.trial_in_flight,
        }
    }

    /// Current state; an Open circuit whose timeout elapsed reports HalfOpen
    pub async fn state(&self, key: &str) -> CircuitState {
        let Some(state) = self.states.read().await.get(key).cloned() else {
            return CircuitState::Closed;
        };
        let st = lock(&state);
        match st.state {
            CircuitState::Open if st.open_elapsed(self.settings.open_timeout) => {
                CircuitState::HalfOpen
            }
            other => other,
        }
    }

    /// Consecutive failures recorded for `key`
    pub async fn consecutive_failures(&self, key: &str) -> u32 {
        match self.states.read().await.get(key) {
            Some(state) => lock(state).consecutive_failures,
            None => 0,
        }
    }

    /// States of every router seen so far
    pub async fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let entries: Vec<(String, Arc<Mutex<BreakerState>>)> = self
            .states
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let state = self.state(&key).await;
            out.push((key, state));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    async fn admit(&self, key: &str) -> Result<Admission> {
        let state = self.entry(key).await;
        let trial = {
            let mut st = lock(&state);
            match st.state {
                CircuitState::Closed => false,
                CircuitState::Open => {
                    if !st.open_elapsed(self.settings.open_timeout) {
                        return Err(AppError::CircuitOpen(key.to_string()));
                    }
                    tracing::info!("Circuit for {} half-open, admitting trial call", key);
                    st.state = CircuitState::HalfOpen;
                    st.trial_in_flight = true;
                    true
                }
                CircuitState::HalfOpen => {
                    if st.trial_in_flight {
                        return Err(AppError::CircuitOpen(key.to_string()));
                    }
                    st.trial_in_flight = true;
                    true
                }
            }
        };
        Ok(Admission {
            key: key.to_string(),
            state,
            settings: self.settings.clone(),
            trial,
            settled: false,
        })
    }

    /// Runs `call` if the circuit admits it and records exactly one outcome.
    ///
    /// # Errors
    ///
    /// [`AppError::CircuitOpen`] without polling `call`, or whatever `call`
    /// returns.
    pub async fn call<T, F>(&self, key: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let admission = self.admit(key).await?;
        let result = call.await;
        admission.finish(Outcome::of(&result));
        result
    }
}
