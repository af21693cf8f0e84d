// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! RouterOS authentication

use md5::compute as md5_compute;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

use super::RouterOsConnection;

impl RouterOsConnection {
    /// Performs the two-step `/login` handshake.
    ///
    /// The first, credential-less `/login` tells us which scheme the router
    /// speaks: a `ret` challenge means pre-6.43 MD5 challenge-response,
    /// otherwise the password is sent directly.
    pub(crate) async fn login(
        &mut self,
        username: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::trace!("Attempting login for user: {}", username);

        let greeting = self
            .command(cancel, "/login", &[])
            .await
            .map_err(|e| self.auth_error(e))?;

        let credentials = match greeting.done.get("ret") {
            Some(challenge_hex) => {
                tracing::trace!("Challenge received, length: {}", challenge_hex.len());
                let response = challenge_response(password, challenge_hex)?;
                vec![format!("=name={username}"), format!("=response={response}")]
            }
            None => vec![
                format!("=name={username}"),
                format!("=password={}", password.expose_secret()),
            ],
        };

        let reply = self
            .command(cancel, "/login", &credentials)
            .await
            .map_err(|e| self.auth_error(e))?;

        if let Some(msg) = reply.done.get("message") {
            tracing::debug!("Login message from {}: {}", self.addr, msg);
        }
        tracing::debug!("Login successful for {} at {}", username, self.addr);
        Ok(())
    }

    fn auth_error(&self, error: AppError) -> AppError {
        match error {
            AppError::Command { message, .. } => AppError::Auth {
                addr: self.addr.clone(),
                message,
            },
            other => other,
        }
    }
}

/// `00` followed by hex MD5 of `0x00 || password || challenge`
fn challenge_response(password: &SecretString, challenge_hex: &str) -> Result<String> {
    let challenge = hex::decode(challenge_hex)
        .map_err(|e| AppError::Protocol(format!("invalid login challenge: {e}")))?;

    let secret = password.expose_secret().as_bytes();
    let mut data = Vec::with_capacity(1 + secret.len() + challenge.len());
    data.push(0u8);
    data.extend_from_slice(secret);
    data.extend_from_slice(&challenge);
    let digest = md5_compute(&data);

    let mut response = String::from("00");
    response.push_str(&hex::encode(digest.0));
    Ok(response)
}
