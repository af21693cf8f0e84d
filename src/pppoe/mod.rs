// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! PPPoE session queries
//!
//! Exact status lookups on one router and fuzzy username search across many.
//! A fuzzy search never fails as a whole: each router's problem is reported
//! next to the matches from the routers that answered.

mod similarity;

use futures_util::future::FutureExt;
use futures_util::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::mikrotik::{FuzzyMatch, FuzzySearch, MikroTikClient, PppoeSession, parse_session};

pub use similarity::similarity;

const PPP_ACTIVE_PRINT: &str = "/ppp/active/print";
const SESSION_PROPLIST: &str = "=.proplist=name,address,uptime,caller-id,encoding";

/// Fuzzy search tuning
#[derive(Debug, Clone)]
pub struct PppoeSettings {
    /// Routers queried at the same time
    pub workers: usize,
    /// Budget for a single router, connection included
    pub router_timeout: Duration,
    /// Scores below this are not reported
    pub min_similarity: f64,
}

impl Default for PppoeSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            router_timeout: Duration::from_secs(10),
            min_similarity: 0.3,
        }
    }
}

#[derive(Clone)]
pub struct PppoeQueryEngine {
    client: MikroTikClient,
    settings: PppoeSettings,
}

impl PppoeQueryEngine {
    #[must_use]
    pub fn new(client: MikroTikClient, settings: PppoeSettings) -> Self {
        Self { client, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &PppoeSettings {
        &self.settings
    }

    /// Active session for exactly `username`, if any.
    ///
    /// # Errors
    ///
    /// Registry, breaker and connection errors.
    pub async fn check_status(
        &self,
        router_id: &str,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PppoeSession>> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::InvalidInput("username cannot be empty".to_string()));
        }
        let target = self.client.resolve(router_id)?;
        let token = cancel.clone();

        self.client
            .with_connection(&target, cancel, move |conn| {
                async move {
                    let reply = conn
                        .command(
                            &token,
                            PPP_ACTIVE_PRINT,
                            &[SESSION_PROPLIST.to_string(), format!("?name={username}")],
                        )
                        .await?;
                    Ok(reply
                        .rows
                        .iter()
                        .filter_map(parse_session)
                        .find(|session| session.username == username))
                }
                .boxed()
            })
            .await
    }

    /// Searches active sessions on `router_ids` for usernames like `fragment`.
    pub async fn fuzzy_search(
        &self,
        fragment: &str,
        router_ids: &[String],
        limit: usize,
        cancel: &CancellationToken,
    ) -> FuzzySearch {
        let fragment = fragment.trim();
        if fragment.is_empty() || limit == 0 {
            return FuzzySearch::default();
        }

        let unique: BTreeSet<String> = router_ids.iter().cloned().collect();
        tracing::debug!(
            "Fuzzy search for '{}' across {} router(s)",
            fragment,
            unique.len()
        );

        let outcomes: Vec<(String, Result<Vec<FuzzyMatch>>)> = stream::iter(unique)
            .map(|router_id| async move {
                let result = self.search_router(&router_id, fragment, cancel).await;
                (router_id, result)
            })
            .buffer_unordered(self.settings.workers.max(1))
            .collect()
            .await;

        let mut search = FuzzySearch::default();
        for (router_id, outcome) in outcomes {
            match outcome {
                Ok(found) => search.matches.extend(found),
                Err(e) => {
                    tracing::warn!("Fuzzy search on {} failed: {}", router_id, e);
                    search.errors.insert(router_id, e.to_string());
                }
            }
        }

        search.matches.sort_by(rank);
        search.matches.truncate(limit);
        search
    }

    async fn search_router(
        &self,
        router_id: &str,
        fragment: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FuzzyMatch>> {
        let target = self.client.resolve(router_id)?;
        let router_name = target.name.clone();
        let token = cancel.clone();
        let deadline = Some(self.settings.router_timeout);

        let usernames = self
            .client
            .with_deadline(&target, cancel, deadline, move |conn| {
                async move {
                    let reply = conn
                        .command(&token, PPP_ACTIVE_PRINT, &[SESSION_PROPLIST.to_string()])
                        .await?;
                    Ok(reply
                        .rows
                        .iter()
                        .filter_map(parse_session)
                        .map(|session| session.username)
                        .collect::<Vec<_>>())
                }
                .boxed()
            })
            .await?;

        Ok(usernames
            .into_iter()
            .filter_map(|username| {
                let score = similarity(fragment, &username);
                (score >= self.settings.min_similarity).then(|| FuzzyMatch {
                    username,
                    router: router_name.clone(),
                    similarity: score,
                })
            })
            .collect())
    }
}

/// Best score first, then router name, then username
fn rank(a: &FuzzyMatch, b: &FuzzyMatch) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.router.cmp(&b.router))
        .then_with(|| a.username.cmp(&b.username))
}
