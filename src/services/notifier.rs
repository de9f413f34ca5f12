// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Out-of-band delivery of verification codes.

use async_trait::async_trait;

/// Delivers a verification code to an institutional email address.
///
/// The verification flow ignores the outcome beyond logging it: the user is
/// told the code was sent either way.
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Development stand-in that only logs what would be emailed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        tracing::debug!(email = %email, code = %code, "Would send verification email");
        Ok(())
    }
}
