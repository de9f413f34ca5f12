// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TrypSync SMS Gateway Server
//!
//! Accepts telephony webhooks and verifies senders against an institutional
//! email domain.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trypsync::{
    config::Config,
    db::SqlUserStore,
    services::{LogNotifier, VerificationService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        email_domain = %config.policy.email_domain,
        "Starting TrypSync SMS gateway"
    );

    // Connect the user store and create the schema once, before serving
    let store = SqlUserStore::connect(&config.database).await?;
    store.ensure_schema().await?;

    let verification = VerificationService::new(
        Arc::new(store.clone()),
        Arc::new(LogNotifier),
        config.policy.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        verification,
    });

    let app = trypsync::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Default directives when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "trypsync=info,tower_http=info,info";

/// Build the log filter. `RUST_LOG` wins outright; the crate's own level is
/// never forced, so debug events (including issued codes from the stub
/// notifier) only appear when asked for.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize structured logging. JSON by default; `LOG_FORMAT=pretty` for
/// human-readable local output.
fn init_logging() {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());

    let pretty = std::env::var("LOG_FORMAT")
        .map(|v| v == "pretty")
        .unwrap_or(false);

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true);

        tracing_subscriber::registry().with(filter).with(format).init();
    }
}
