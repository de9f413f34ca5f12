// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User store: persisted onboarding state keyed by phone number.
//!
//! Handlers only see `Arc<dyn UserStore>`. Production wires in
//! [`SqlUserStore`]; tests swap in [`MemoryUserStore`].

pub mod memory;
pub mod sql;

pub use memory::MemoryUserStore;
pub use sql::SqlUserStore;

use crate::error::Result;
use crate::models::User;
use async_trait::async_trait;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user without creating one.
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>>;

    /// Return the user for this number, creating an unverified one if absent.
    async fn get_or_create(&self, phone_number: &str) -> Result<User>;

    /// Persist the mutable fields (email, verified flag, pending code).
    ///
    /// Fails with `UniqueViolation` if another number already holds the email
    /// and with `NotFound` if the phone number was never created.
    async fn save(&self, user: &User) -> Result<()>;
}
