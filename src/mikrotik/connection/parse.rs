// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! RouterOS response parsing helpers

use crate::mikrotik::types::{NatRule, PppoeSession, Row};

pub(crate) fn parse_nat_rule(row: &Row) -> NatRule {
    NatRule {
        id: row.text(".id"),
        chain: row.text("chain"),
        action: row.text("action"),
        src_address: row.text("src-address"),
        dst_address: row.text("dst-address"),
        dst_port: row.text("dst-port"),
        protocol: row.text("protocol"),
        comment: row.text("comment"),
    }
}

pub(crate) fn parse_session(row: &Row) -> Option<PppoeSession> {
    let username = row.get("name")?;
    Some(PppoeSession {
        username: username.to_string(),
        address: row.text("address"),
        uptime: row.text("uptime"),
        caller_id: row.text("caller-id"),
        encoding: row.text("encoding"),
    })
}
