// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process user store for tests and local experiments.

use super::UserStore;
use crate::error::{AppError, Result};
use crate::models::User;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// `DashMap`-backed store with the same uniqueness rules as the SQL schema.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<DashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        Ok(self.users.get(phone_number).map(|entry| entry.value().clone()))
    }

    async fn get_or_create(&self, phone_number: &str) -> Result<User> {
        let entry = self
            .users
            .entry(phone_number.to_string())
            .or_insert_with(|| User::new(phone_number, Utc::now()));
        Ok(entry.value().clone())
    }

    async fn save(&self, user: &User) -> Result<()> {
        if let Some(email) = &user.institutional_email {
            let taken = self.users.iter().any(|entry| {
                entry.key() != &user.phone_number
                    && entry.value().institutional_email.as_ref() == Some(email)
            });
            if taken {
                return Err(AppError::UniqueViolation(
                    "users.institutional_email".to_string(),
                ));
            }
        }

        match self.users.get_mut(&user.phone_number) {
            Some(mut entry) => {
                let stored = entry.value_mut();
                stored.institutional_email = user.institutional_email.clone();
                stored.is_verified = user.is_verified;
                stored.pending_code = user.pending_code.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "User {} not found",
                user.phone_number
            ))),
        }
    }
}
