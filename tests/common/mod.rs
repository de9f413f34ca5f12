// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use std::sync::{Arc, Mutex};
use trypsync::config::Config;
use trypsync::db::MemoryUserStore;
use trypsync::routes::create_router;
use trypsync::services::{CodeNotifier, VerificationService};
use trypsync::AppState;

/// Notifier that remembers every (email, code) pair instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl CodeNotifier for RecordingNotifier {
    async fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// Handles into a test app backed by in-memory collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemoryUserStore>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Create a test app with in-memory store and recording notifier.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(MemoryUserStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let verification =
        VerificationService::new(store.clone(), notifier.clone(), config.policy.clone());
    let state = Arc::new(AppState {
        config,
        verification,
    });

    TestApp {
        router: create_router(state),
        store,
        notifier,
    }
}

/// Build a form-encoded webhook POST. `None` omits the field.
#[allow(dead_code)]
pub fn sms_request(from: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut fields = Vec::new();
    if let Some(from) = from {
        fields.push(format!("From={}", urlencoding::encode(from)));
    }
    if let Some(body) = body {
        fields.push(format!("Body={}", urlencoding::encode(body)));
    }
    fields.push("MessageSid=SM00000000000000000000000000000000".to_string());

    Request::builder()
        .method("POST")
        .uri("/sms")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(fields.join("&")))
        .unwrap()
}

/// Pull the single `<Message>` text out of a messaging response.
#[allow(dead_code)]
pub fn message_text(document: &str) -> String {
    let start = document.find("<Message>").expect("message open tag") + "<Message>".len();
    let end = document.find("</Message>").expect("message close tag");
    assert_eq!(
        document.matches("<Message>").count(),
        1,
        "exactly one message expected"
    );
    document[start..end]
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
