// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TrypSync: SMS onboarding gateway
//!
//! Receives inbound text messages from a telephony webhook and walks each
//! phone number through institutional email verification before it may
//! request rides.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod twiml;

use config::Config;
use services::VerificationService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub verification: VerificationService,
}
