// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Low-level RouterOS API connection handling

mod auth;
mod parse;
pub(crate) mod protocol;

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

use super::types::{Reply, Row};
pub(crate) use parse::{parse_nat_rule, parse_session};
use protocol::{read_sentence, write_sentence};

/// Default read operation timeout (30 seconds)
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Low-level RouterOS API connection
///
/// Exchanges are strictly request/response: one command is written and its
/// reply read to `!done` before the next command is issued. Any transport or
/// framing failure (or a cancelled exchange) marks the connection broken;
/// broken connections are never handed back out by the pool.
pub struct RouterOsConnection {
    stream: TcpStream,
    addr: String,
    read_timeout: Duration,
    broken: bool,
}

impl RouterOsConnection {
    pub(crate) async fn open(
        addr: &str,
        dial_timeout: Duration,
        read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        tracing::trace!("Attempting TCP connection to: {}", addr);
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            dialed = timeout(dial_timeout, TcpStream::connect(addr)) => {
                dialed.map_err(|_| {
                    AppError::Timeout(format!("TCP connect to {addr} exceeded {dial_timeout:?}"))
                })??
            }
        };
        stream.set_nodelay(true)?;
        tracing::trace!("TCP connection established to: {}", addr);
        Ok(Self {
            stream,
            addr: addr.to_string(),
            read_timeout,
            broken: false,
        })
    }

    /// Remote address this connection was dialed to
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the protocol state of this connection is unknown
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Sends a command sentence and reads its complete reply.
    ///
    /// # Errors
    ///
    /// [`AppError::Command`] when the router answers with `!trap` (the
    /// connection stays usable), [`AppError::Cancelled`] or
    /// [`AppError::Timeout`] when the exchange is interrupted, and
    /// [`AppError::Io`] / [`AppError::Protocol`] for transport faults.
    pub async fn command(
        &mut self,
        cancel: &CancellationToken,
        path: &str,
        args: &[String],
    ) -> Result<Reply> {
        if self.broken {
            return Err(AppError::Protocol(format!(
                "connection to {} is no longer usable",
                self.addr
            )));
        }

        let read_timeout = self.read_timeout;
        let addr = self.addr.clone();
        tracing::trace!("Sending {} with {} argument(s) to {}", path, args.len(), addr);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            exchanged = timeout(read_timeout, self.exchange(path, args)) => match exchanged {
                Ok(inner) => inner,
                Err(_) => Err(AppError::Timeout(format!(
                    "{addr} did not answer {path} within {read_timeout:?}"
                ))),
            },
        };

        if let Err(e) = &result {
            if e.is_connection_fault() {
                tracing::debug!("Marking connection to {} broken: {}", addr, e);
                self.broken = true;
            }
        }
        result
    }

    async fn exchange(&mut self, path: &str, args: &[String]) -> Result<Reply> {
        let mut words: Vec<&str> = Vec::with_capacity(1 + args.len());
        words.push(path);
        words.extend(args.iter().map(String::as_str));
        write_sentence(&mut self.stream, &words).await?;
        self.read_reply(path).await
    }

    async fn read_reply(&mut self, command: &str) -> Result<Reply> {
        let mut reply = Reply::default();
        let mut trap: Option<String> = None;

        loop {
            let sentence = match read_sentence(&mut self.stream).await {
                Ok(sentence) => sentence,
                Err(e) => {
                    if let Some(message) = trap {
                        // The trap already explains the failure; the stream is gone though.
                        tracing::debug!("Stream failed after trap from {}: {}", self.addr, e);
                        self.broken = true;
                        return Err(AppError::Command {
                            command: command.to_string(),
                            message,
                        });
                    }
                    return Err(e);
                }
            };

            let Some((tag, attributes)) = sentence.split_first() else {
                continue;
            };
            tracing::trace!("Received {} with {} word(s)", tag, attributes.len());

            match tag.as_str() {
                "!re" => reply.rows.push(parse_attributes(attributes)?),
                "!done" => {
                    reply.done = parse_attributes(attributes)?;
                    break;
                }
                "!trap" => {
                    let details = parse_attributes(attributes)?;
                    if trap.is_none() {
                        trap = Some(details.get("message").unwrap_or("trap").to_string());
                    }
                }
                "!fatal" => {
                    self.broken = true;
                    return Err(AppError::Protocol(format!(
                        "router closed the session: {}",
                        attributes.join(" ")
                    )));
                }
                other => {
                    return Err(AppError::Protocol(format!(
                        "unexpected reply tag '{other}' to {command}"
                    )));
                }
            }
        }

        if let Some(message) = trap {
            tracing::trace!("Command {} trapped: {}", command, message);
            return Err(AppError::Command {
                command: command.to_string(),
                message,
            });
        }
        tracing::trace!("Command {} complete, {} row(s) received", command, reply.rows.len());
        Ok(reply)
    }

    /// Best-effort close of the underlying socket
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!("Error closing connection to {}: {}", self.addr, e);
        }
    }
}

/// Parses `=key=value` words into an ordered row; `.tag=` words are ignored
pub(crate) fn parse_attributes(words: &[String]) -> Result<Row> {
    let mut row = Row::new();
    for word in words {
        if let Some(stripped) = word.strip_prefix('=') {
            match stripped.split_once('=') {
                Some((k, v)) => row.insert(k, v),
                None => row.insert(stripped, ""),
            }
        } else if word.starts_with(".tag=") {
            continue;
        } else {
            return Err(AppError::Protocol(format!(
                "unexpected word '{word}' in reply"
            )));
        }
    }
    Ok(row)
}
