// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! `MikroTik` `RouterOS` API client module
//!
//! Wire codec, connection establishment, pooling and circuit breaking for
//! RouterOS API sessions.

mod breaker;
mod client;
mod connection;
mod connector;
mod pool;
mod types;

// Re-export public types and functions
pub use breaker::{BreakerSettings, CircuitBreakers, CircuitState};
pub use client::MikroTikClient;
pub use connection::RouterOsConnection;
pub use connection::protocol::{
    encode_length, encode_sentence, read_length, read_sentence, read_word, write_sentence,
};
pub use connector::{Connector, ConnectorSettings};
pub use pool::{ConnectionPool, Lease, PoolSettings, PoolStats};
pub use types::{
    ConnectionStatus, FuzzyMatch, FuzzySearch, LinkStatus, NatRule, NatUpdate, PppoeSession,
    Reply, Row,
};

pub(crate) use connection::{parse_nat_rule, parse_session};
