// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SMS onboarding flow.
//!
//! Each inbound message moves a user through:
//! 1. AwaitingEmail: the body must be an address under the institution domain
//! 2. AwaitingCode: the body must be the six-digit code emailed in step 1
//! 3. Verified: terminal; replies with ride-request instructions
//!
//! [`decide`] is pure. [`VerificationService`] loads the user, applies the
//! decision, persists it and fires the email side effect.

use crate::config::EnrollmentPolicy;
use crate::db::UserStore;
use crate::error::Result;
use crate::models::{User, VerificationState};
use crate::services::CodeNotifier;
use rand::Rng;
use std::sync::Arc;

const RIDE_EXAMPLE: &str = "'8:30pm, 3 people'";

/// Outcome of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Body is not an institutional address; nothing changes.
    PromptForEmail,
    /// Address accepted and a code issued for it.
    EmailAccepted { email: String, code: String },
    /// Body matched the pending code.
    CodeAccepted,
    /// Body did not match the pending code; nothing changes.
    CodeRejected { email: String },
    /// User was already verified; nothing changes.
    AlreadyVerified,
}

/// Decide what an inbound `body` does to `user`.
///
/// The email step compares a trimmed, lowercased copy of the body. The code
/// step compares the raw body byte for byte, so surrounding whitespace fails.
pub fn decide<R: Rng + ?Sized>(
    user: &User,
    body: &str,
    policy: &EnrollmentPolicy,
    rng: &mut R,
) -> Transition {
    match user.state() {
        VerificationState::AwaitingEmail => {
            let email = body.trim().to_lowercase();
            if email.ends_with(&policy.email_domain) {
                Transition::EmailAccepted {
                    email,
                    code: generate_code(rng),
                }
            } else {
                Transition::PromptForEmail
            }
        }
        VerificationState::AwaitingCode => {
            let matches = user
                .pending_code
                .as_deref()
                .is_some_and(|code| !code.is_empty() && code == body);
            if matches {
                Transition::CodeAccepted
            } else {
                Transition::CodeRejected {
                    email: user.institutional_email.clone().unwrap_or_default(),
                }
            }
        }
        VerificationState::Verified => Transition::AlreadyVerified,
    }
}

/// Uniform over 000000..=999999, always six digits.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format_code(rng.gen_range(0..=999_999))
}

fn format_code(n: u32) -> String {
    format!("{n:06}")
}

impl Transition {
    /// Apply this transition to `user`. Returns true if any field changed.
    pub fn apply(&self, user: &mut User) -> bool {
        match self {
            Transition::EmailAccepted { email, code } => {
                user.institutional_email = Some(email.clone());
                user.pending_code = Some(code.clone());
                true
            }
            Transition::CodeAccepted => {
                user.is_verified = true;
                user.pending_code = None;
                true
            }
            Transition::PromptForEmail
            | Transition::CodeRejected { .. }
            | Transition::AlreadyVerified => false,
        }
    }

    /// SMS text sent back for this transition.
    pub fn reply(&self, policy: &EnrollmentPolicy) -> String {
        match self {
            Transition::PromptForEmail => format!(
                "Welcome to TrypSync! To use this service, reply with your {} email ending in {}.\n\
                 Example: akhil.arularasu{}",
                policy.institution_name, policy.email_domain, policy.email_domain
            ),
            Transition::EmailAccepted { email, .. } => format!(
                "Thanks! We sent a 6-digit code to {email}. \
                 Reply with that code here to verify your account."
            ),
            Transition::CodeAccepted => format!(
                "You're verified ✅ as {} {} student. From now on, just text us \
                 your ride requests from {} to ATL airport.\n\nExample: {RIDE_EXAMPLE}.",
                indefinite_article(&policy.institution_name),
                policy.institution_name,
                policy.institution_name
            ),
            Transition::CodeRejected { email } => format!(
                "That code is incorrect. Please reply with the 6-digit code we sent to {email}."
            ),
            Transition::AlreadyVerified => format!(
                "You're already verified ✅. \
                 Send your ride request like: {RIDE_EXAMPLE} and we'll match you."
            ),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::PromptForEmail => "prompt_for_email",
            Transition::EmailAccepted { .. } => "email_accepted",
            Transition::CodeAccepted => "code_accepted",
            Transition::CodeRejected { .. } => "code_rejected",
            Transition::AlreadyVerified => "already_verified",
        }
    }
}

fn indefinite_article(word: &str) -> &'static str {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// Runs the onboarding flow against a store and a code notifier.
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn CodeNotifier>,
    policy: EnrollmentPolicy,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn CodeNotifier>,
        policy: EnrollmentPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    /// Handle one inbound SMS and return the reply text.
    ///
    /// Mutations are saved before the reply is produced so that a redelivered
    /// webhook sees the new state. Store errors propagate; notifier errors are
    /// only logged.
    pub async fn handle_message(&self, phone_number: &str, body: &str) -> Result<String> {
        let mut user = self.store.get_or_create(phone_number).await?;

        let transition = decide(&user, body, &self.policy, &mut rand::thread_rng());

        tracing::info!(
            phone = %phone_number,
            transition = transition.kind(),
            "Verification step"
        );

        if transition.apply(&mut user) {
            self.store.save(&user).await?;
        }

        if let Transition::EmailAccepted { email, code } = &transition {
            if let Err(e) = self.notifier.send_code(email, code).await {
                tracing::warn!(
                    error = %e,
                    phone = %phone_number,
                    "Failed to deliver verification code"
                );
            }
        }

        Ok(transition.reply(&self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    const PHONE: &str = "+14045551234";

    fn policy() -> EnrollmentPolicy {
        EnrollmentPolicy::default()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn awaiting_code(code: &str) -> User {
        let mut user = User::new(PHONE, Utc::now());
        user.institutional_email = Some("akhil@emory.edu".to_string());
        user.pending_code = Some(code.to_string());
        user
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
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

    struct FailingNotifier;

    #[async_trait]
    impl CodeNotifier for FailingNotifier {
        async fn send_code(&self, _email: &str, _code: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp relay unreachable")
        }
    }

    #[test]
    fn test_code_is_zero_padded() {
        assert_eq!(format_code(7), "000007");
        assert_eq!(format_code(0), "000000");
        assert_eq!(format_code(999_999), "999999");
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        let mut rng = rng();
        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_non_institution_body_prompts_for_email() {
        let user = User::new(PHONE, Utc::now());
        for body in ["", "hello", "akhil@gmail.com", "akhil@emory.edu.evil.com", "@emory.ed"] {
            let transition = decide(&user, body, &policy(), &mut rng());
            assert_eq!(transition, Transition::PromptForEmail, "body {body:?}");
        }
    }

    #[test]
    fn test_email_is_trimmed_and_lowercased() {
        let user = User::new(PHONE, Utc::now());
        let transition = decide(&user, "  Akhil.Arularasu@EMORY.edu \n", &policy(), &mut rng());

        match transition {
            Transition::EmailAccepted { email, code } => {
                assert_eq!(email, "akhil.arularasu@emory.edu");
                assert_eq!(code.len(), 6);
            }
            other => panic!("unexpected transition {other:?}"),
        }
    }

    #[test]
    fn test_exact_code_verifies() {
        let mut user = awaiting_code("042613");
        let transition = decide(&user, "042613", &policy(), &mut rng());
        assert_eq!(transition, Transition::CodeAccepted);

        assert!(transition.apply(&mut user));
        assert!(user.is_verified);
        assert!(user.pending_code.is_none());
        assert_eq!(user.institutional_email.as_deref(), Some("akhil@emory.edu"));
    }

    #[test]
    fn test_near_miss_codes_rejected() {
        let user = awaiting_code("042613");
        for body in ["42613", " 042613", "042613 ", "", "0426130"] {
            let transition = decide(&user, body, &policy(), &mut rng());
            assert_eq!(
                transition,
                Transition::CodeRejected {
                    email: "akhil@emory.edu".to_string()
                },
                "body {body:?}"
            );
        }
    }

    #[test]
    fn test_missing_code_never_matches() {
        let mut user = awaiting_code("042613");
        user.pending_code = None;
        let transition = decide(&user, "", &policy(), &mut rng());
        assert!(matches!(transition, Transition::CodeRejected { .. }));
    }

    #[test]
    fn test_verified_is_terminal() {
        let mut user = awaiting_code("042613");
        user.is_verified = true;
        user.pending_code = None;
        let before = user.clone();

        for body in ["042613", "8:30pm, 3 people", "akhil@emory.edu", ""] {
            let transition = decide(&user, body, &policy(), &mut rng());
            assert_eq!(transition, Transition::AlreadyVerified);
            assert!(!transition.apply(&mut user));
        }
        assert_eq!(user, before);
    }

    #[test]
    fn test_replies() {
        let policy = policy();

        let prompt = Transition::PromptForEmail.reply(&policy);
        assert!(prompt.contains("ending in @emory.edu"));
        assert!(prompt.contains("Example: akhil.arularasu@emory.edu"));

        let sent = Transition::EmailAccepted {
            email: "akhil@emory.edu".to_string(),
            code: "000007".to_string(),
        }
        .reply(&policy);
        assert!(sent.contains("akhil@emory.edu"));
        assert!(!sent.contains("000007"));

        let verified = Transition::CodeAccepted.reply(&policy);
        assert!(verified.starts_with("You're verified ✅ as an Emory student."));

        let rejected = Transition::CodeRejected {
            email: "akhil@emory.edu".to_string(),
        }
        .reply(&policy);
        assert!(rejected.starts_with("That code is incorrect."));
        assert!(rejected.ends_with("akhil@emory.edu."));

        assert!(Transition::AlreadyVerified
            .reply(&policy)
            .starts_with("You're already verified"));
    }

    #[test]
    fn test_indefinite_article() {
        assert_eq!(indefinite_article("Emory"), "an");
        assert_eq!(indefinite_article("Georgia Tech"), "a");
        assert_eq!(indefinite_article(""), "a");
    }

    #[tokio::test]
    async fn test_service_full_flow() {
        let store = Arc::new(MemoryUserStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = VerificationService::new(store.clone(), notifier.clone(), policy());

        let reply = service.handle_message(PHONE, "hi").await.unwrap();
        assert!(reply.starts_with("Welcome to TrypSync!"));
        let user = store.find_by_phone(PHONE).await.unwrap().unwrap();
        assert!(!user.is_verified);
        assert!(user.institutional_email.is_none());
        assert!(user.pending_code.is_none());

        let reply = service.handle_message(PHONE, "Akhil@Emory.edu").await.unwrap();
        assert!(reply.contains("akhil@emory.edu"));

        let user = store.find_by_phone(PHONE).await.unwrap().unwrap();
        let code = user.pending_code.clone().expect("code stored");
        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            &[("akhil@emory.edu".to_string(), code.clone())]
        );

        let reply = service.handle_message(PHONE, &code).await.unwrap();
        assert!(reply.starts_with("You're verified"));

        for _ in 0..3 {
            let reply = service.handle_message(PHONE, &code).await.unwrap();
            assert!(reply.starts_with("You're already verified"));
            let user = store.find_by_phone(PHONE).await.unwrap().unwrap();
            assert!(user.is_verified);
            assert!(user.pending_code.is_none());
        }
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_change_reply() {
        let store = Arc::new(MemoryUserStore::new());
        let service = VerificationService::new(store.clone(), Arc::new(FailingNotifier), policy());

        let reply = service.handle_message(PHONE, "akhil@emory.edu").await.unwrap();
        assert!(reply.starts_with("Thanks! We sent a 6-digit code to akhil@emory.edu."));

        let user = store.find_by_phone(PHONE).await.unwrap().unwrap();
        assert!(user.pending_code.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_propagates() {
        let store = Arc::new(MemoryUserStore::new());
        let service = VerificationService::new(
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            policy(),
        );

        service
            .handle_message("+14045550001", "akhil@emory.edu")
            .await
            .unwrap();
        let err = service
            .handle_message("+14045550002", "AKHIL@emory.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::UniqueViolation(_)));

        let second = store.find_by_phone("+14045550002").await.unwrap().unwrap();
        assert!(second.institutional_email.is_none());
    }
}
