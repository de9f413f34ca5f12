// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model keyed by phone number.

use chrono::{DateTime, Utc};

/// One row per phone number that has ever texted the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Sender number from the webhook (primary key)
    pub phone_number: String,
    /// Lowercased institutional address, once supplied
    pub institutional_email: Option<String>,
    /// Set once the emailed code has been echoed back
    pub is_verified: bool,
    /// Six-digit code awaiting confirmation
    pub pending_code: Option<String>,
    /// When the number first texted us
    pub created_at: DateTime<Utc>,
}

/// Where a user is in onboarding. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    AwaitingEmail,
    AwaitingCode,
    Verified,
}

impl User {
    /// A fresh, unverified record.
    pub fn new(phone_number: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            phone_number: phone_number.into(),
            institutional_email: None,
            is_verified: false,
            pending_code: None,
            created_at,
        }
    }

    pub fn state(&self) -> VerificationState {
        match (self.is_verified, &self.institutional_email) {
            (true, _) => VerificationState::Verified,
            (false, None) => VerificationState::AwaitingEmail,
            (false, Some(_)) => VerificationState::AwaitingCode,
        }
    }
}
