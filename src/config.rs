// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; nothing here is consulted per request
//! except through the `Config` held in `AppState`.

use std::env;

const DEFAULT_DATABASE_URL: &str = "sqlite://trypsync.db?mode=rwc";
const DEFAULT_EMAIL_DOMAIN: &str = "@emory.edu";
const DEFAULT_INSTITUTION: &str = "Emory";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Backing store selection
    pub database: DatabaseConfig,
    /// Who may verify, and how replies refer to them
    pub policy: EnrollmentPolicy,
}

/// Which database to connect to and how large the pool may grow.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string (`sqlite://...`, `postgres://...`)
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

/// Institutional membership rule used by the verification flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPolicy {
    /// Required email suffix, lowercase, always starting with `@`
    pub email_domain: String,
    /// Display name used in reply texts
    pub institution_name: String,
}

impl EnrollmentPolicy {
    pub fn new(email_domain: &str, institution_name: &str) -> Self {
        Self {
            email_domain: normalize_domain(email_domain),
            institution_name: institution_name.trim().to_string(),
        }
    }

    /// Like [`EnrollmentPolicy::new`], but rejects a domain that would leave
    /// only the bare `@`, which every address ends in.
    pub fn parse(email_domain: &str, institution_name: &str) -> Result<Self, ConfigError> {
        let policy = Self::new(email_domain, institution_name);
        if policy.email_domain.len() <= 1 {
            return Err(ConfigError::Invalid {
                name: "EMAIL_DOMAIN",
                value: email_domain.to_string(),
            });
        }
        Ok(policy)
    }
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EMAIL_DOMAIN, DEFAULT_INSTITUTION)
    }
}

/// Lowercase the suffix and make sure it is anchored at the `@`.
fn normalize_domain(raw: &str) -> String {
    let domain = raw.trim().to_lowercase();
    if domain.starts_with('@') {
        domain
    } else {
        format!("@{domain}")
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        if DatabaseKind::from_url(&url).is_none() {
            return Err(ConfigError::UnsupportedDatabase(url));
        }

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            database: DatabaseConfig {
                url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            policy: EnrollmentPolicy::parse(
                &env::var("EMAIL_DOMAIN").unwrap_or_else(|_| DEFAULT_EMAIL_DOMAIN.to_string()),
                &env::var("INSTITUTION_NAME").unwrap_or_else(|_| DEFAULT_INSTITUTION.to_string()),
            )?,
        })
    }

    /// Config for tests: in-memory SQLite on a single connection.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            policy: EnrollmentPolicy::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Database engine named by a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// File-based embedded engine shared by every request task
    Sqlite,
    /// Network database; always reached over TLS
    Postgres,
}

impl DatabaseKind {
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if lower.starts_with("postgres://")
            || lower.starts_with("postgresql://")
            || lower.contains("supabase")
        {
            Some(Self::Postgres)
        } else {
            None
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Unsupported DATABASE_URL (expected sqlite: or postgres://): {0}")]
    UnsupportedDatabase(String),
}
