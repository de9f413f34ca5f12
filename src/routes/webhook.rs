// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound SMS webhook.

use crate::error::{AppError, Result};
use crate::twiml;
use crate::AppState;
use axum::{
    extract::{Form, State},
    http::header,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sms", post(receive_sms))
}

/// Form fields posted by the telephony provider. Anything else it sends
/// (message SID, geo hints, media counts) is ignored.
#[derive(Deserialize, Debug)]
pub struct InboundSms {
    /// Sender phone number
    #[serde(rename = "From")]
    pub from: String,
    /// Message text; absent for empty messages
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// Handle one inbound SMS (POST).
async fn receive_sms(
    State(state): State<Arc<AppState>>,
    Form(sms): Form<InboundSms>,
) -> Result<impl IntoResponse> {
    let phone_number = sms.from.trim();
    if phone_number.is_empty() {
        return Err(AppError::BadRequest("From must not be empty".to_string()));
    }

    tracing::debug!(phone = %phone_number, body_len = sms.body.len(), "Inbound SMS");

    let reply = state
        .verification
        .handle_message(phone_number, &sms.body)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        twiml::message_response(&reply),
    ))
}
