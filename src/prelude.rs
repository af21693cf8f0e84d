// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prelude module for convenient imports
//!
//! ```rust
//! use mikrotik_gateway::prelude::*;
//! ```

// Core types
pub use crate::config::{Config, RouterConfig};
pub use crate::error::{AppError, Result};

// Gateway and workflows
pub use crate::gateway::Gateway;
pub use crate::nat::NatRuleManager;
pub use crate::pppoe::{PppoeQueryEngine, PppoeSettings};
pub use crate::registry::{RouterDirectory, RouterRegistry, RouterTarget};

// MikroTik client
pub use crate::mikrotik::{
    BreakerSettings, CircuitBreakers, CircuitState, ConnectionPool, ConnectionStatus, Connector,
    ConnectorSettings, FuzzySearch, MikroTikClient, NatUpdate, PoolSettings, PppoeSession,
};
