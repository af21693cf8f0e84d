// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Configuration module for MikroTik Gateway application
//!
//! Loads and parses configuration from environment variables and JSON.

use serde::Deserialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::mikrotik::{BreakerSettings, ConnectorSettings, PoolSettings};
use crate::pppoe::PppoeSettings;


/// Default configuration values
pub mod defaults {
    pub const SERVER_ADDR: &str = "0.0.0.0:8080";
    pub const ROUTEROS_PORT: u16 = 8728;
    pub const ROUTEROS_USERNAME: &str = "admin";
    pub const ROUTEROS_PASSWORD: &str = "";
    pub const CLEANUP_INTERVAL_SECS: u64 = 60;
    pub const ACTIVITY_BUFFER: usize = 1024;
}

/// Environment variable names used by the application
pub mod env_vars {
    pub const SERVER_ADDR: &str = "SERVER_ADDR";
    pub const ROUTERS_CONFIG: &str = "ROUTERS_CONFIG";
    pub const ROUTERS_FILE: &str = "ROUTERS_FILE";
    pub const ROUTEROS_ADDRESS: &str = "ROUTEROS_ADDRESS";
    pub const ROUTEROS_USERNAME: &str = "ROUTEROS_USERNAME";
    pub const ROUTEROS_PASSWORD: &str = "ROUTEROS_PASSWORD";
    pub const POOL_MAX_CONNECTIONS: &str = "POOL_MAX_CONNECTIONS";
    pub const POOL_IDLE_TIMEOUT_SECONDS: &str = "POOL_IDLE_TIMEOUT_SECONDS";
    pub const POOL_MAX_LIFETIME_SECONDS: &str = "POOL_MAX_LIFETIME_SECONDS";
    pub const POOL_ACQUIRE_TIMEOUT_SECONDS: &str = "POOL_ACQUIRE_TIMEOUT_SECONDS";
    pub const POOL_CLEANUP_INTERVAL_SECONDS: &str = "POOL_CLEANUP_INTERVAL_SECONDS";
    pub const BREAKER_FAILURE_THRESHOLD: &str = "BREAKER_FAILURE_THRESHOLD";
    pub const BREAKER_OPEN_TIMEOUT_SECONDS: &str = "BREAKER_OPEN_TIMEOUT_SECONDS";
    pub const CONNECT_ATTEMPTS: &str = "CONNECT_ATTEMPTS";
    pub const CONNECT_TIMEOUT_STEP_SECONDS: &str = "CONNECT_TIMEOUT_STEP_SECONDS";
    pub const CONNECT_BACKOFF_STEP_SECONDS: &str = "CONNECT_BACKOFF_STEP_SECONDS";
    pub const READ_TIMEOUT_SECONDS: &str = "READ_TIMEOUT_SECONDS";
    pub const FUZZY_WORKERS: &str = "FUZZY_WORKERS";
    pub const FUZZY_ROUTER_TIMEOUT_SECONDS: &str = "FUZZY_ROUTER_TIMEOUT_SECONDS";
    pub const FUZZY_MIN_SIMILARITY: &str = "FUZZY_MIN_SIMILARITY";
}

fn default_port() -> u16 {
    defaults::ROUTEROS_PORT
}

fn default_enabled() -> bool {
    true
}

/// Configuration for a single MikroTik router
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RouterConfig {
    /// Validates router configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Router id cannot be empty".to_string());
        }

        if self.host.trim().is_empty() {
            return Err(format!("Host cannot be empty for router '{}'", self.id));
        }

        if self.port == 0 {
            return Err(format!("Port cannot be 0 for router '{}'", self.id));
        }

        if self.username.trim().is_empty() {
            return Err(format!("Username cannot be empty for router '{}'", self.id));
        }

        Ok(())
    }

    /// Name shown to users; falls back to the id
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Where router records are read from, chosen once at startup
#[derive(Debug, Clone)]
pub enum RouterSource {
    /// JSON array given directly in `ROUTERS_CONFIG`
    Inline(String),
    /// Path to a JSON file (`ROUTERS_FILE`)
    File(PathBuf),
    /// Single router from `ROUTEROS_ADDRESS` and friends
    Legacy {
        address: String,
        username: String,
        password: String,
    },
    None,
}

impl RouterSource {
    /// Picks the source from the environment; a file wins over inline JSON
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(env_vars::ROUTERS_FILE) {
            return Self::File(PathBuf::from(path));
        }
        if let Ok(json) = std::env::var(env_vars::ROUTERS_CONFIG) {
            return Self::Inline(json);
        }
        if let Ok(address) = std::env::var(env_vars::ROUTEROS_ADDRESS) {
            return Self::Legacy {
                address,
                username: std::env::var(env_vars::ROUTEROS_USERNAME)
                    .unwrap_or_else(|_| defaults::ROUTEROS_USERNAME.to_string()),
                password: std::env::var(env_vars::ROUTEROS_PASSWORD)
                    .unwrap_or_else(|_| defaults::ROUTEROS_PASSWORD.to_string()),
            };
        }
        Self::None
    }

    /// Reads the router records.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the JSON cannot be parsed or the
    /// legacy address is malformed, and [`AppError::Io`] if the file cannot
    /// be read.
    pub fn load(&self) -> Result<Vec<RouterConfig>> {
        match self {
            Self::Inline(json) => serde_json::from_str(json)
                .map_err(|e| AppError::Config(format!("Failed to parse ROUTERS_CONFIG: {e}"))),
            Self::File(path) => {
                let json = std::fs::read_to_string(path)?;
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Config(format!("Failed to parse {}: {e}", path.display()))
                })
            }
            Self::Legacy {
                address,
                username,
                password,
            } => {
                let (host, port) = split_address(address)?;
                Ok(vec![RouterConfig {
                    id: "default".to_string(),
                    name: "default".to_string(),
                    host,
                    port,
                    username: username.clone(),
                    password: password.clone(),
                    enabled: true,
                }])
            }
            Self::None => Ok(vec![]),
        }
    }
}

/// Splits `host[:port]`, accepting `[v6]:port`
fn split_address(address: &str) -> Result<(String, u16)> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| AppError::Config(format!("Invalid address format '{address}'")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(address, p)?,
            None => defaults::ROUTEROS_PORT,
        };
        return Ok((host.to_string(), port));
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            Ok((host.to_string(), parse_port(address, port)?))
        }
        _ => Ok((address.to_string(), defaults::ROUTEROS_PORT)),
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| AppError::Config(format!("Invalid port in address '{address}'")))
}

/// Reads and parses an environment variable, falling back to `default`
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid value for {}: {}. Using default.", name, e);
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(name, default.as_secs()))
}

/// Application-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub routers: Vec<RouterConfig>,
    pub pool: PoolSettings,
    pub breaker: BreakerSettings,
    pub connector: ConnectorSettings,
    pub pppoe: PppoeSettings,
    pub cleanup_interval_secs: u64,
    pub activity_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: defaults::SERVER_ADDR.to_string(),
            routers: vec![],
            pool: PoolSettings::default(),
            breaker: BreakerSettings::default(),
            connector: ConnectorSettings::default(),
            pppoe: PppoeSettings::default(),
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
            activity_buffer: defaults::ACTIVITY_BUFFER,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let server_addr = std::env::var(env_vars::SERVER_ADDR)
            .unwrap_or_else(|_| defaults::SERVER_ADDR.to_string());

        let source = RouterSource::from_env();
        let routers = source.load().unwrap_or_else(|e| {
            tracing::warn!("{}. Using empty router list.", e);
            vec![]
        });
        if matches!(source, RouterSource::None) {
            tracing::warn!("No router configuration found. Service will start with no routers.");
        }

        let base = Config::default();
        let pool = PoolSettings {
            max_connections: env_or(env_vars::POOL_MAX_CONNECTIONS, base.pool.max_connections)
                .max(1),
            idle_timeout: env_secs(env_vars::POOL_IDLE_TIMEOUT_SECONDS, base.pool.idle_timeout),
            max_lifetime: env_secs(env_vars::POOL_MAX_LIFETIME_SECONDS, base.pool.max_lifetime),
            acquire_timeout: env_secs(
                env_vars::POOL_ACQUIRE_TIMEOUT_SECONDS,
                base.pool.acquire_timeout,
            ),
        };
        let breaker = BreakerSettings {
            failure_threshold: env_or(
                env_vars::BREAKER_FAILURE_THRESHOLD,
                base.breaker.failure_threshold,
            )
            .max(1),
            open_timeout: env_secs(
                env_vars::BREAKER_OPEN_TIMEOUT_SECONDS,
                base.breaker.open_timeout,
            ),
        };
        let connector = ConnectorSettings {
            attempts: env_or(env_vars::CONNECT_ATTEMPTS, base.connector.attempts).max(1),
            dial_timeout_step: env_secs(
                env_vars::CONNECT_TIMEOUT_STEP_SECONDS,
                base.connector.dial_timeout_step,
            ),
            backoff_step: env_secs(
                env_vars::CONNECT_BACKOFF_STEP_SECONDS,
                base.connector.backoff_step,
            ),
            read_timeout: env_secs(env_vars::READ_TIMEOUT_SECONDS, base.connector.read_timeout),
        };
        let pppoe = PppoeSettings {
            workers: env_or(env_vars::FUZZY_WORKERS, base.pppoe.workers).max(1),
            router_timeout: env_secs(
                env_vars::FUZZY_ROUTER_TIMEOUT_SECONDS,
                base.pppoe.router_timeout,
            ),
            min_similarity: env_or(env_vars::FUZZY_MIN_SIMILARITY, base.pppoe.min_similarity)
                .clamp(0.0, 1.0),
        };
        let cleanup_interval_secs =
            env_or(env_vars::POOL_CLEANUP_INTERVAL_SECONDS, base.cleanup_interval_secs).max(1);

        Config {
            server_addr,
            routers,
            pool,
            breaker,
            connector,
            pppoe,
            cleanup_interval_secs,
            activity_buffer: base.activity_buffer,
        }
    }
}
