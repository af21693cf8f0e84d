// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

mod common;

use std::time::{Duration, Instant};

use common::{GatewayBuilder, MockRouter, MockSession, MockState};
use mikrotik_gateway::{AppError, BreakerSettings, CircuitState, PppoeSettings};
use tokio_util::sync::CancellationToken;

fn sessions(names: &[&str]) -> MockState {
    MockState {
        sessions: names
            .iter()
            .enumerate()
            .map(|(i, name)| MockSession::new(name, &format!("100.64.0.{}", i + 2)))
            .collect(),
        ..MockState::default()
    }
}

fn short_timeout() -> PppoeSettings {
    PppoeSettings {
        router_timeout: Duration::from_millis(300),
        ..PppoeSettings::default()
    }
}

#[tokio::test]
async fn fuzzy_search_isolates_a_hanging_router() {
    let healthy = MockRouter::start(sessions(&["john", "joko", "mark"])).await;
    let hanging = MockRouter::start(MockState {
        hang: true,
        ..MockState::default()
    })
    .await;

    let mut builder = GatewayBuilder::new(vec![
        healthy.config("a", "Router A"),
        hanging.config("b", "Router B"),
    ]);
    builder.pppoe = short_timeout();
    let gateway = builder.build();

    let started = Instant::now();
    let search = gateway
        .fuzzy_search_pppoe(
            "jo",
            &["a".to_string(), "b".to_string()],
            3,
            &CancellationToken::new(),
        )
        .await;
    assert!(started.elapsed() < Duration::from_secs(2));

    let names: Vec<&str> = search.matches.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["john", "joko"]);
    assert!(search.matches.len() <= 3);
    assert!(search.matches.iter().all(|m| m.router == "Router A"));
    assert!(
        search
            .matches
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity)
    );

    assert!(search.errors.contains_key("b"));
    assert!(!search.errors.contains_key("a"));
}

#[tokio::test]
async fn repeated_search_timeouts_open_the_circuit() {
    let hanging = MockRouter::start(MockState {
        hang: true,
        ..MockState::default()
    })
    .await;

    let mut builder = GatewayBuilder::new(vec![hanging.config("b", "Router B")]);
    builder.pppoe = PppoeSettings {
        router_timeout: Duration::from_millis(200),
        ..PppoeSettings::default()
    };
    builder.breaker = BreakerSettings {
        failure_threshold: 3,
        open_timeout: Duration::from_secs(30),
    };
    let gateway = builder.build();
    let cancel = CancellationToken::new();
    let routers = ["b".to_string()];

    for _ in 0..3 {
        let search = gateway.fuzzy_search_pppoe("jo", &routers, 3, &cancel).await;
        assert!(search.errors["b"].contains("did not answer"), "{search:?}");
    }
    let breakers = gateway.client().breakers();
    assert_eq!(breakers.state("b").await, CircuitState::Open);
    assert_eq!(breakers.consecutive_failures("b").await, 3);

    // Open circuit answers without dialing the router again
    let started = Instant::now();
    let search = gateway.fuzzy_search_pppoe("jo", &routers, 3, &cancel).await;
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(search.errors.contains_key("b"));
    assert_eq!(hanging.accepted(), 3);
    assert_eq!(gateway.client().pool().stats().await.active, 0);
}

#[tokio::test]
async fn fuzzy_search_respects_limit_and_order() {
    let a = MockRouter::start(sessions(&["jo", "john", "mojo", "bjorn"])).await;
    let b = MockRouter::start(sessions(&["joe", "jonas"])).await;
    let gateway = GatewayBuilder::new(vec![a.config("a", "alpha"), b.config("b", "beta")]).build();

    let search = gateway
        .fuzzy_search_pppoe(
            "jo",
            &["a".to_string(), "b".to_string()],
            3,
            &CancellationToken::new(),
        )
        .await;

    assert!(search.errors.is_empty());
    let found: Vec<(&str, &str)> = search
        .matches
        .iter()
        .map(|m| (m.router.as_str(), m.username.as_str()))
        .collect();
    // Exact match first, then prefix matches by score
    assert_eq!(found, vec![("alpha", "jo"), ("beta", "joe"), ("alpha", "john")]);
}

#[tokio::test]
async fn fuzzy_search_reports_unknown_routers_and_dedupes() {
    let a = MockRouter::start(sessions(&["john"])).await;
    let gateway = GatewayBuilder::new(vec![a.config("a", "alpha")]).build();

    let search = gateway
        .fuzzy_search_pppoe(
            "john",
            &["a".to_string(), "a".to_string(), "ghost".to_string()],
            10,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(search.matches.len(), 1);
    assert!(search.errors.contains_key("ghost"));
    assert_eq!(a.accepted(), 1);
}

#[tokio::test]
async fn empty_fragment_or_zero_limit_contacts_nobody() {
    let a = MockRouter::start(sessions(&["john"])).await;
    let gateway = GatewayBuilder::new(vec![a.config("a", "alpha")]).build();
    let cancel = CancellationToken::new();

    let search = gateway
        .fuzzy_search_pppoe("  ", &["a".to_string()], 10, &cancel)
        .await;
    assert!(search.matches.is_empty() && search.errors.is_empty());

    let search = gateway
        .fuzzy_search_pppoe("jo", &["a".to_string()], 0, &cancel)
        .await;
    assert!(search.matches.is_empty() && search.errors.is_empty());

    assert_eq!(a.accepted(), 0);
}

#[tokio::test]
async fn check_status_matches_exact_username() {
    let a = MockRouter::start(sessions(&["john", "johnny"])).await;
    let gateway = GatewayBuilder::new(vec![a.config("a", "alpha")]).build();
    let cancel = CancellationToken::new();

    let session = gateway
        .check_pppoe_status("a", "john", &cancel)
        .await
        .unwrap()
        .expect("john is online");
    assert_eq!(session.username, "john");
    assert_eq!(session.address, "100.64.0.2");
    assert_eq!(session.uptime, "3h12m");

    let offline = gateway.check_pppoe_status("a", "jo", &cancel).await.unwrap();
    assert!(offline.is_none());

    // Both lookups went over the same pooled connection
    assert_eq!(a.accepted(), 1);
}

#[tokio::test]
async fn check_status_on_disabled_router() {
    let a = MockRouter::start(sessions(&["john"])).await;
    let mut config = a.config("a", "alpha");
    config.enabled = false;
    let gateway = GatewayBuilder::new(vec![config]).build();

    let err = gateway
        .check_pppoe_status("a", "john", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RouterDisabled(_)));
    assert_eq!(a.accepted(), 0);
}
