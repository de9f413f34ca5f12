// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQL user store on top of the sqlx `Any` driver.
//!
//! The same schema and queries serve SQLite (local default) and PostgreSQL.
//! `created_at` is kept as RFC3339 text because `Any` has no portable
//! timestamp type.

use super::UserStore;
use crate::config::{DatabaseConfig, DatabaseKind};
use crate::error::{AppError, Result};
use crate::models::User;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    phone_number        TEXT PRIMARY KEY CHECK (length(phone_number) > 0),
    institutional_email TEXT UNIQUE,
    is_verified         BOOLEAN NOT NULL DEFAULT FALSE,
    pending_code        TEXT CHECK (pending_code IS NULL OR length(pending_code) = 6),
    created_at          TEXT NOT NULL
)
"#;

/// Row shape as read from the `users` table.
///
/// SQLite hands booleans to `Any` as integers while PostgreSQL hands them over
/// as booleans, so the flag is selected as a BIGINT on both.
#[derive(sqlx::FromRow)]
struct UserRow {
    phone_number: String,
    institutional_email: Option<String>,
    is_verified: i64,
    pending_code: Option<String>,
    created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        let created_at = parse_utc_rfc3339(&row.created_at).map_err(|e| {
            AppError::Database(format!(
                "Corrupt created_at {:?} for {}: {}",
                row.created_at, row.phone_number, e
            ))
        })?;

        Ok(User {
            phone_number: row.phone_number,
            institutional_email: row.institutional_email,
            is_verified: row.is_verified != 0,
            pending_code: row.pending_code,
            created_at,
        })
    }
}

/// Pooled SQL store. Cheap to clone; every clone shares the pool.
#[derive(Clone)]
pub struct SqlUserStore {
    pool: AnyPool,
}

impl SqlUserStore {
    /// Open the connection pool described by `config`.
    ///
    /// PostgreSQL connections always negotiate TLS. SQLite pools are shared by
    /// every request task; sqlx's busy timeout covers writer contention.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let kind = DatabaseKind::from_url(&config.url).ok_or_else(|| {
            AppError::Database(format!("Unsupported database URL: {}", config.url))
        })?;
        let url = connection_url(&config.url, kind);

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .test_before_acquire(true);

        // Each in-memory SQLite connection is its own database, so the pool
        // must never recycle the one it has.
        if kind == DatabaseKind::Sqlite && url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&url).await?;

        tracing::info!(
            kind = ?kind,
            max_connections = config.max_connections,
            "Connected to user store"
        );

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        tracing::debug!("User schema ensured");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Force TLS on PostgreSQL URLs.
///
/// A missing `sslmode` becomes `require`, and the modes that may fall back to
/// plaintext (`disable`, `allow`, `prefer`) are raised to `require`.
/// `require`, `verify-ca` and `verify-full` are kept as given.
fn connection_url(url: &str, kind: DatabaseKind) -> String {
    if kind != DatabaseKind::Postgres {
        return url.to_string();
    }

    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let mut saw_sslmode = false;
    let mut params: Vec<String> = Vec::new();
    for param in query.into_iter().flat_map(|q| q.split('&')) {
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("sslmode") => {
                saw_sslmode = true;
                let mode = value.to_ascii_lowercase();
                if matches!(mode.as_str(), "require" | "verify-ca" | "verify-full") {
                    params.push(param.to_string());
                } else {
                    tracing::warn!(sslmode = %value, "Raising PostgreSQL sslmode to require");
                    params.push("sslmode=require".to_string());
                }
            }
            _ => params.push(param.to_string()),
        }
    }
    if !saw_sslmode {
        params.push("sslmode=require".to_string());
    }

    format!("{base}?{}", params.join("&"))
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT phone_number,
                   institutional_email,
                   CAST(CASE WHEN is_verified THEN 1 ELSE 0 END AS BIGINT) AS is_verified,
                   pending_code,
                   created_at
            FROM users
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_or_create(&self, phone_number: &str) -> Result<User> {
        if let Some(user) = self.find_by_phone(phone_number).await? {
            return Ok(user);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (phone_number, institutional_email, is_verified, pending_code, created_at)
            VALUES ($1, NULL, FALSE, NULL, $2)
            ON CONFLICT (phone_number) DO NOTHING
            "#,
        )
        .bind(phone_number)
        .bind(format_utc_rfc3339(Utc::now()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(phone = %phone_number, "New user created");
        }

        self.find_by_phone(phone_number).await?.ok_or_else(|| {
            AppError::Database(format!("User {phone_number} missing after insert"))
        })
    }

    async fn save(&self, user: &User) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE users
               SET institutional_email = $2,
                   is_verified = $3,
                   pending_code = $4
             WHERE phone_number = $1
            "#,
        )
        .bind(user.phone_number.clone())
        .bind(user.institutional_email.clone())
        .bind(user.is_verified)
        .bind(user.pending_code.clone())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound(format!(
                "User {} not found",
                user.phone_number
            )));
        }
        Ok(())
    }
}
