// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

mod common;

use std::time::Duration;

use common::{MockRouter, MockState, fast_connector};
use mikrotik_gateway::{AppError, Connector, ConnectorSettings, RouterTarget};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A local port nothing listens on
async fn refused_target() -> RouterTarget {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    RouterTarget {
        id: "down".to_string(),
        name: "down".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        username: "admin".to_string(),
        password: secrecy::SecretString::new(String::new().into()),
    }
}

fn three_attempts(backoff_step: Duration) -> ConnectorSettings {
    ConnectorSettings {
        attempts: 3,
        dial_timeout_step: Duration::from_secs(1),
        backoff_step,
        read_timeout: Duration::from_secs(1),
    }
}

#[tokio::test(start_paused = true)]
async fn refused_dial_is_retried_until_budget_is_spent() {
    let target = refused_target().await;
    let connector = Connector::new(three_attempts(Duration::from_secs(2)));

    let started = Instant::now();
    let err = connector
        .connect(&target, &CancellationToken::new())
        .await
        .err()
        .unwrap();

    match err {
        AppError::Dial { addr, attempts } => {
            assert_eq!(addr, target.address());
            assert_eq!(attempts.len(), 3);
            for (i, failure) in attempts.iter().enumerate() {
                assert!(failure.starts_with(&format!("attempt {}:", i + 1)), "{failure}");
            }
        }
        other => panic!("expected dial failure, got {other:?}"),
    }
    // Backoffs of 2s and 4s between the three attempts
    assert!(started.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_returns_cancelled() {
    let target = refused_target().await;
    let connector = Connector::new(three_attempts(Duration::from_secs(60)));
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { connector.connect(&target, &cancel).await }
    });

    // The first attempt is over after at most one dial timeout
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!task.is_finished());
    cancel.cancel();

    let err = task.await.unwrap().err().unwrap();
    assert!(matches!(err, AppError::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn first_successful_attempt_is_used() {
    let router = MockRouter::start(MockState::default()).await;
    let mut settings = fast_connector();
    settings.attempts = 3;

    let conn = Connector::new(settings)
        .connect(&router.target("r1"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!conn.is_broken());
    assert_eq!(router.accepted(), 1);
}
