// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Scripted in-process RouterOS API server for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mikrotik_gateway::{
    ActivityLog, BreakerSettings, CircuitBreakers, ConnectionPool, Connector, ConnectorSettings,
    Gateway, MetricsRegistry, PoolSettings, PppoeSettings, RouterConfig, RouterRegistry,
    RouterTarget, read_sentence, write_sentence,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub struct MockRule {
    pub id: String,
    pub dst_address: String,
    pub dst_port: String,
    pub comment: String,
}

impl MockRule {
    pub fn new(id: &str, comment: &str, dst_address: &str, dst_port: &str) -> Self {
        Self {
            id: id.to_string(),
            dst_address: dst_address.to_string(),
            dst_port: dst_port.to_string(),
            comment: comment.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockSession {
    pub name: String,
    pub address: String,
}

impl MockSession {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

/// What the mock router knows and how it misbehaves
#[derive(Debug, Clone)]
pub struct MockState {
    pub password: String,
    pub identity: String,
    pub rules: Vec<MockRule>,
    pub sessions: Vec<MockSession>,
    /// `nat/set` answers `!done` but changes nothing
    pub frozen_nat: bool,
    /// Accepts connections and never answers
    pub hang: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            password: PASSWORD.to_string(),
            identity: "MockRouter".to_string(),
            rules: Vec::new(),
            sessions: Vec::new(),
            frozen_nat: false,
            hang: false,
        }
    }
}

pub struct MockRouter {
    pub addr: SocketAddr,
    state: Arc<Mutex<MockState>>,
    accepted: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockRouter {
    pub async fn start(state: MockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));
        let accepted = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn({
            let state = state.clone();
            let accepted = accepted.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, state.clone()));
                }
            }
        });

        Self {
            addr,
            state,
            accepted,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn rule(&self, id: &str) -> Option<MockRule> {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn config(&self, id: &str, name: &str) -> RouterConfig {
        router_config(id, name, self.port())
    }

    pub fn target(&self, id: &str) -> RouterTarget {
        RouterTarget {
            id: id.to_string(),
            name: id.to_string(),
            host: "127.0.0.1".to_string(),
            port: self.port(),
            username: "admin".to_string(),
            password: secrecy::SecretString::new(PASSWORD.to_string().into()),
        }
    }
}

impl Drop for MockRouter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn router_config(id: &str, name: &str, port: u16) -> RouterConfig {
    RouterConfig {
        id: id.to_string(),
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port,
        username: "admin".to_string(),
        password: PASSWORD.to_string(),
        enabled: true,
    }
}

/// Quick single-attempt connector for tests
pub fn fast_connector() -> ConnectorSettings {
    ConnectorSettings {
        attempts: 1,
        dial_timeout_step: Duration::from_secs(2),
        backoff_step: Duration::from_millis(10),
        read_timeout: Duration::from_secs(2),
    }
}

pub struct GatewayBuilder {
    pub routers: Vec<RouterConfig>,
    pub pool: PoolSettings,
    pub connector: ConnectorSettings,
    pub breaker: BreakerSettings,
    pub pppoe: PppoeSettings,
}

impl GatewayBuilder {
    pub fn new(routers: Vec<RouterConfig>) -> Self {
        Self {
            routers,
            pool: PoolSettings::default(),
            connector: fast_connector(),
            breaker: BreakerSettings::default(),
            pppoe: PppoeSettings::default(),
        }
    }

    pub fn build(self) -> Gateway {
        let pool = ConnectionPool::new(Connector::new(self.connector), self.pool);
        Gateway::new(
            Arc::new(RouterRegistry::new(self.routers)),
            Arc::new(pool),
            Arc::new(CircuitBreakers::new(self.breaker)),
            self.pppoe,
            ActivityLog::disabled(),
            MetricsRegistry::new(),
        )
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<MockState>>) {
    while let Ok(words) = read_sentence(&mut stream).await {
        let Some((command, args)) = words.split_first() else {
            continue;
        };
        let snapshot = state.lock().unwrap().clone();
        if snapshot.hang {
            std::future::pending::<()>().await;
        }

        let replies = respond(command, args, &state);
        for reply in replies {
            if write_sentence(&mut stream, &reply).await.is_err() {
                return;
            }
        }
    }
}

fn attr<'a>(args: &'a [String], prefix: &str, key: &str) -> Option<&'a str> {
    let needle = format!("{prefix}{key}=");
    args.iter().find_map(|a| a.strip_prefix(needle.as_str()))
}

fn done() -> Vec<String> {
    vec!["!done".to_string()]
}

fn trap(message: &str) -> Vec<Vec<String>> {
    vec![
        vec!["!trap".to_string(), format!("=message={message}")],
        done(),
    ]
}

fn respond(command: &str, args: &[String], state: &Mutex<MockState>) -> Vec<Vec<String>> {
    let mut state = state.lock().unwrap();
    match command {
        "/login" => match (attr(args, "=", "name"), attr(args, "=", "password")) {
            (None, _) => vec![done()],
            (Some(_), Some(password)) if password == state.password => vec![done()],
            _ => trap("invalid user name or password (6)"),
        },
        "/system/identity/print" => vec![
            vec!["!re".to_string(), format!("=name={}", state.identity)],
            done(),
        ],
        "/system/resource/print" => vec![
            vec![
                "!re".to_string(),
                "=version=7.14.3 (stable)".to_string(),
                "=uptime=1w2d".to_string(),
            ],
            done(),
        ],
        "/ip/firewall/nat/print" => {
            let wanted = attr(args, "?", ".id");
            let mut replies: Vec<Vec<String>> = state
                .rules
                .iter()
                .filter(|r| wanted.is_none_or(|id| r.id == id))
                .map(|r| {
                    vec![
                        "!re".to_string(),
                        format!("=.id={}", r.id),
                        "=chain=dstnat".to_string(),
                        "=action=dst-nat".to_string(),
                        format!("=dst-address={}", r.dst_address),
                        format!("=dst-port={}", r.dst_port),
                        "=protocol=tcp".to_string(),
                        format!("=comment={}", r.comment),
                    ]
                })
                .collect();
            replies.push(done());
            replies
        }
        "/ip/firewall/nat/set" => {
            let Some(id) = attr(args, "=", ".id") else {
                return trap("missing .id");
            };
            let frozen = state.frozen_nat;
            let Some(rule) = state.rules.iter_mut().find(|r| r.id == id) else {
                return trap("no such item");
            };
            if !frozen {
                if let Some(address) = attr(args, "=", "dst-address") {
                    rule.dst_address = address.to_string();
                }
                if let Some(port) = attr(args, "=", "dst-port") {
                    rule.dst_port = port.to_string();
                }
            }
            vec![done()]
        }
        "/ppp/active/print" => {
            let wanted = attr(args, "?", "name");
            let mut replies: Vec<Vec<String>> = state
                .sessions
                .iter()
                .filter(|s| wanted.is_none_or(|name| s.name == name))
                .map(|s| {
                    vec![
                        "!re".to_string(),
                        format!("=name={}", s.name),
                        format!("=address={}", s.address),
                        "=uptime=3h12m".to_string(),
                        "=caller-id=AA:BB:CC:DD:EE:FF".to_string(),
                        "=encoding=".to_string(),
                    ]
                })
                .collect();
            replies.push(done());
            replies
        }
        _ => trap("no such command"),
    }
}
