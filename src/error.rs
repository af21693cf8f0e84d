// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Error types for MikroTik Gateway

use std::time::Duration;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parsing error
    #[error("Address parse error")]
    AddrParse(#[from] std::net::AddrParseError),

    /// Requested router or rule does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Router exists in the registry but is switched off
    #[error("Router '{0}' is disabled")]
    RouterDisabled(String),

    /// Every connection attempt failed
    #[error("Failed to connect to {addr} after {} attempt(s): {}", attempts.len(), attempts.join("; "))]
    Dial { addr: String, attempts: Vec<String> },

    /// Router rejected the credentials
    #[error("Authentication failed for {addr}: {message}")]
    Auth { addr: String, message: String },

    /// Malformed or unexpected framing on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Router answered a well-formed command with `!trap`
    #[error("RouterOS command {command} failed: {message}")]
    Command { command: String, message: String },

    /// A network step did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Circuit breaker is open for the router
    #[error("Circuit open for router '{0}'")]
    CircuitOpen(String),

    /// No pooled connection became free within the wait budget
    #[error("Connection pool exhausted for {router} after waiting {waited:?}")]
    PoolExhausted { router: String, waited: Duration },

    /// Connection pool was shut down
    #[error("Connection pool is shut down")]
    PoolClosed,

    /// Router accepted an update but the re-read state differs
    #[error("Verification failed for rule {rule_id}: expected {expected}, found {actual}")]
    Verification {
        rule_id: String,
        expected: String,
        actual: String,
    },

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl AppError {
    /// Whether the connection that produced this error is in an unknown
    /// protocol state and must be evicted instead of returned to the pool.
    #[must_use]
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Protocol(_) | Self::Timeout(_) | Self::Cancelled
        )
    }

    /// Whether this error counts against the router in the circuit breaker.
    #[must_use]
    pub fn is_router_fault(&self) -> bool {
        matches!(
            self,
            Self::Dial { .. } | Self::Auth { .. } | Self::Io(_) | Self::Protocol(_) | Self::Timeout(_)
        )
    }

    /// Whether the error originates on the caller side, so the router was
    /// never actually judged.
    #[must_use]
    pub fn is_caller_side(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::PoolExhausted { .. } | Self::PoolClosed
        )
    }

    /// Short machine-readable kind used in API responses and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::AddrParse(_) => "addr_parse",
            Self::NotFound(_) => "not_found",
            Self::RouterDisabled(_) => "router_disabled",
            Self::Dial { .. } => "dial",
            Self::Auth { .. } => "auth",
            Self::Protocol(_) => "protocol",
            Self::Command { .. } => "command",
            Self::Timeout(_) => "timeout",
            Self::CircuitOpen(_) => "circuit_open",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::PoolClosed => "pool_closed",
            Self::Verification { .. } => "verification",
            Self::Cancelled => "cancelled",
            Self::InvalidInput(_) => "invalid_input",
            Self::Metrics(_) => "metrics",
        }
    }
}

/// Convenient alias for Result with application error
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_dial_error_lists_attempts() {
        let err = AppError::Dial {
            addr: "10.0.0.1:8728".to_string(),
            attempts: vec![
                "attempt 1: refused".to_string(),
                "attempt 2: refused".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to 10.0.0.1:8728 after 2 attempt(s): attempt 1: refused; attempt 2: refused"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_addr_parse_error_conversion() {
        let parse_result = "invalid".parse::<std::net::IpAddr>();
        assert!(parse_result.is_err());
        let app_err: AppError = parse_result.unwrap_err().into();
        assert!(matches!(app_err, AppError::AddrParse(_)));
    }

    #[test]
    fn test_connection_faults_are_evicted() {
        assert!(AppError::Protocol("bad".into()).is_connection_fault());
        assert!(AppError::Timeout("read".into()).is_connection_fault());
        assert!(AppError::Cancelled.is_connection_fault());
        assert!(
            !AppError::Command {
                command: "/ip/firewall/nat/set".into(),
                message: "no such item".into(),
            }
            .is_connection_fault()
        );
    }

    #[test]
    fn test_router_fault_classification() {
        assert!(
            AppError::Auth {
                addr: "r".into(),
                message: "invalid".into()
            }
            .is_router_fault()
        );
        assert!(!AppError::NotFound("rule".into()).is_router_fault());
        assert!(!AppError::CircuitOpen("r1".into()).is_router_fault());
        assert!(AppError::PoolClosed.is_caller_side());
        assert!(!AppError::PoolClosed.is_router_fault());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AppError::CircuitOpen("r1".into()).kind(), "circuit_open");
        assert_eq!(
            AppError::PoolExhausted {
                router: "r1".into(),
                waited: Duration::from_secs(5)
            }
            .kind(),
            "pool_exhausted"
        );
    }
}
