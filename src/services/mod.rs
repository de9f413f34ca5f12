// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod notifier;
pub mod verification;

pub use notifier::{CodeNotifier, LogNotifier};
pub use verification::{generate_code, Transition, VerificationService};
