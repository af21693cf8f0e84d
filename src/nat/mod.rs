// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! NAT rule lookup and retargeting
//!
//! Rules are associated with a PPPoE user through their comment. An update
//! is only reported as successful once a fresh read of the rule shows the
//! requested destination.

use futures_util::future::FutureExt;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::mikrotik::{MikroTikClient, NatRule, NatUpdate, RouterOsConnection, parse_nat_rule};

const NAT_PRINT: &str = "/ip/firewall/nat/print";
const NAT_SET: &str = "/ip/firewall/nat/set";
const NAT_PROPLIST: &str =
    "=.proplist=.id,chain,action,src-address,dst-address,dst-port,protocol,comment";

/// Finds and updates NAT rules on behalf of PPPoE users
#[derive(Clone)]
pub struct NatRuleManager {
    client: MikroTikClient,
}

impl NatRuleManager {
    #[must_use]
    pub fn new(client: MikroTikClient) -> Self {
        Self { client }
    }

    /// First rule (in router order) whose comment names `username`.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] when no comment matches, plus any connection,
    /// breaker or registry error.
    pub async fn find_by_username(
        &self,
        router_id: &str,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<NatRule> {
        let username = require("username", username)?;
        let target = self.client.resolve(router_id)?;
        let token = cancel.clone();

        self.client
            .with_connection(&target, cancel, move |conn| {
                async move { find_rule(conn, &token, &username).await }.boxed()
            })
            .await
    }

    /// Points rule `rule_id` at `new_ip:new_port` and verifies the change.
    ///
    /// # Errors
    ///
    /// [`AppError::Verification`] if the re-read rule does not show the
    /// requested destination, even though the router accepted the `set`.
    pub async fn update_destination(
        &self,
        router_id: &str,
        rule_id: &str,
        new_ip: IpAddr,
        new_port: u16,
        cancel: &CancellationToken,
    ) -> Result<NatRule> {
        let rule_id = require("rule id", rule_id)?;
        let target = self.client.resolve(router_id)?;
        let token = cancel.clone();

        let rule = self
            .client
            .with_connection(&target, cancel, move |conn| {
                async move { set_destination(conn, &token, &rule_id, new_ip, new_port).await }
                    .boxed()
            })
            .await?;
        tracing::info!(
            "NAT rule {} on {} now points to {}",
            rule.id,
            router_id,
            rule.destination()
        );
        Ok(rule)
    }

    /// Finds the user's rule and retargets it within a single lease.
    ///
    /// # Errors
    ///
    /// Same as [`Self::find_by_username`] and [`Self::update_destination`].
    pub async fn retarget_user(
        &self,
        router_id: &str,
        username: &str,
        new_ip: IpAddr,
        new_port: u16,
        cancel: &CancellationToken,
    ) -> Result<NatUpdate> {
        let username = require("username", username)?;
        let target = self.client.resolve(router_id)?;
        let token = cancel.clone();

        let update = self
            .client
            .with_connection(&target, cancel, move |conn| {
                async move {
                    let before = find_rule(conn, &token, &username).await?;
                    let after = set_destination(conn, &token, &before.id, new_ip, new_port).await?;
                    Ok(NatUpdate {
                        rule_id: after.id.clone(),
                        old_destination: before.destination(),
                        new_destination: after.destination(),
                    })
                }
                .boxed()
            })
            .await?;
        tracing::info!(
            "NAT rule {} on {} moved from {} to {}",
            update.rule_id,
            router_id,
            update.old_destination,
            update.new_destination
        );
        Ok(update)
    }
}

fn require(what: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

async fn find_rule(
    conn: &mut RouterOsConnection,
    cancel: &CancellationToken,
    username: &str,
) -> Result<NatRule> {
    let reply = conn
        .command(cancel, NAT_PRINT, &[NAT_PROPLIST.to_string()])
        .await?;
    tracing::trace!("Scanning {} NAT rule(s) for {}", reply.rows.len(), username);
    reply
        .rows
        .iter()
        .find(|row| {
            row.get("comment")
                .is_some_and(|comment| comment_mentions(comment, username))
        })
        .map(parse_nat_rule)
        .ok_or_else(|| AppError::NotFound(format!("NAT rule for user '{username}'")))
}

async fn read_rule(
    conn: &mut RouterOsConnection,
    cancel: &CancellationToken,
    rule_id: &str,
) -> Result<NatRule> {
    let reply = conn
        .command(
            cancel,
            NAT_PRINT,
            &[NAT_PROPLIST.to_string(), format!("?.id={rule_id}")],
        )
        .await?;
    reply
        .rows
        .iter()
        .map(parse_nat_rule)
        .find(|rule| rule.id == rule_id)
        .ok_or_else(|| AppError::NotFound(format!("NAT rule {rule_id}")))
}

async fn set_destination(
    conn: &mut RouterOsConnection,
    cancel: &CancellationToken,
    rule_id: &str,
    new_ip: IpAddr,
    new_port: u16,
) -> Result<NatRule> {
    conn.command(
        cancel,
        NAT_SET,
        &[
            format!("=.id={rule_id}"),
            format!("=dst-address={new_ip}"),
            format!("=dst-port={new_port}"),
        ],
    )
    .await?;

    let rule = read_rule(conn, cancel, rule_id).await?;
    verify(&rule, new_ip, new_port)?;
    Ok(rule)
}

fn verify(rule: &NatRule, ip: IpAddr, port: u16) -> Result<()> {
    let address = rule
        .dst_address
        .trim_end_matches("/32")
        .trim_end_matches("/128");
    let address_ok = address.parse::<IpAddr>().is_ok_and(|a| a == ip);
    let port_ok = rule.dst_port.trim().parse::<u16>().is_ok_and(|p| p == port);

    if address_ok && port_ok {
        return Ok(());
    }
    Err(AppError::Verification {
        rule_id: rule.id.clone(),
        expected: format!("{ip}:{port}"),
        actual: rule.destination(),
    })
}

/// Whether `username` appears as a whole token in a rule comment
pub(crate) fn comment_mentions(comment: &str, username: &str) -> bool {
    comment
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')))
        .any(|token| token == username)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(address: &str, port: &str) -> NatRule {
        NatRule {
            id: "*3".to_string(),
            chain: "dstnat".to_string(),
            action: "dst-nat".to_string(),
            src_address: String::new(),
            dst_address: address.to_string(),
            dst_port: port.to_string(),
            protocol: "tcp".to_string(),
            comment: "alice".to_string(),
        }
    }

    #[test]
    fn test_comment_mentions_whole_token() {
        assert!(comment_mentions("alice", "alice"));
        assert!(comment_mentions("PPPoE: alice (port fwd)", "alice"));
        assert!(comment_mentions("fwd for alice.smith@isp", "alice.smith@isp"));
        assert!(!comment_mentions("alice2", "alice"));
        assert!(!comment_mentions("malice", "alice"));
        assert!(!comment_mentions("", "alice"));
    }

    #[test]
    fn test_verify_matching_destination() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(verify(&rule("10.0.0.5", "8080"), ip, 8080).is_ok());
        assert!(verify(&rule("10.0.0.5/32", "8080"), ip, 8080).is_ok());
    }

    #[test]
    fn test_verify_mismatch() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        let err = verify(&rule("172.22.28.5", "80"), ip, 8080).unwrap_err();
        match err {
            AppError::Verification {
                rule_id,
                expected,
                actual,
            } => {
                assert_eq!(rule_id, "*3");
                assert_eq!(expected, "10.0.0.5:8080");
                assert_eq!(actual, "172.22.28.5:80");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_verify_port_only_mismatch() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(verify(&rule("10.0.0.5", "80"), ip, 8080).is_err());
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(matches!(require("username", "  "), Err(AppError::InvalidInput(_))));
        assert_eq!(require("username", " bob ").unwrap(), "bob");
    }
}
