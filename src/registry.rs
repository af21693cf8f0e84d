// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Router lookup
//!
//! The gateway only needs to turn a router id into connection details.
//! Where the records come from is decided once at startup (see
//! [`crate::config::RouterSource`]).

use secrecy::SecretString;
use std::collections::HashMap;

use crate::config::RouterConfig;
use crate::error::{AppError, Result};

/// Connection details for one router, resolved per operation
#[derive(Debug)]
pub struct RouterTarget {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl RouterTarget {
    /// `host:port`, bracketing bare IPv6 hosts
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Key under which pooled connections for this target are kept
    #[must_use]
    pub fn pool_key(&self) -> String {
        format!("{}@{}", self.username, self.address())
    }
}

/// Source of router connection details
pub trait RouterDirectory: Send + Sync {
    /// Resolves a router id.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] for an unknown id and
    /// [`AppError::RouterDisabled`] for a disabled router.
    fn router_target(&self, id: &str) -> Result<RouterTarget>;
}

/// In-memory router table built from configuration
#[derive(Debug, Default)]
pub struct RouterRegistry {
    routers: HashMap<String, RouterConfig>,
}

impl RouterRegistry {
    /// Builds the table, skipping invalid records
    #[must_use]
    pub fn new(routers: Vec<RouterConfig>) -> Self {
        let mut table = HashMap::with_capacity(routers.len());
        for router in routers {
            if let Err(e) = router.validate() {
                tracing::error!("Invalid router configuration: {}", e);
                tracing::warn!("Skipping invalid router: {}", router.id);
                continue;
            }
            if table.contains_key(&router.id) {
                tracing::warn!("Duplicate router id '{}', keeping the first entry", router.id);
                continue;
            }
            table.insert(router.id.clone(), router);
        }
        Self { routers: table }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Router ids in sorted order
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl RouterDirectory for RouterRegistry {
    fn router_target(&self, id: &str) -> Result<RouterTarget> {
        let router = self
            .routers
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("router '{id}'")))?;
        if !router.enabled {
            return Err(AppError::RouterDisabled(id.to_string()));
        }
        Ok(RouterTarget {
            id: router.id.clone(),
            name: router.display_name().to_string(),
            host: router.host.clone(),
            port: router.port,
            username: router.username.clone(),
            password: SecretString::new(router.password.clone().into()),
        })
    }
}
