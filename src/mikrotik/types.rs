// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Type definitions for RouterOS replies and the records built from them

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// One `!re` row (or the attributes of `!done`), in wire order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(IndexMap<String, String>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key`, or an empty string when the router omitted it
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Complete reply to a single command
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// One entry per `!re` sentence, in protocol order
    pub rows: Vec<Row>,
    /// Attributes carried by the closing `!done` (e.g. `ret`)
    pub done: Row,
}

/// A firewall NAT rule as reported by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatRule {
    pub id: String,
    pub chain: String,
    pub action: String,
    pub src_address: String,
    pub dst_address: String,
    pub dst_port: String,
    pub protocol: String,
    pub comment: String,
}

impl NatRule {
    /// Destination formatted as `address:port`
    #[must_use]
    pub fn destination(&self) -> String {
        if self.dst_port.is_empty() {
            self.dst_address.clone()
        } else {
            format!("{}:{}", self.dst_address, self.dst_port)
        }
    }
}

/// Result of retargeting a user's NAT rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatUpdate {
    pub rule_id: String,
    pub old_destination: String,
    pub new_destination: String,
}

/// An active PPPoE session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PppoeSession {
    pub username: String,
    pub address: String,
    pub uptime: String,
    pub caller_id: String,
    pub encoding: String,
}

/// A username matched by fuzzy search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatch {
    pub username: String,
    pub router: String,
    pub similarity: f64,
}

/// Aggregated fuzzy search result; `errors` is keyed by router id
#[derive(Debug, Clone, Default, Serialize)]
pub struct FuzzySearch {
    pub matches: Vec<FuzzyMatch>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
}
