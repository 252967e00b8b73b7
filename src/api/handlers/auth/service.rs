//! Account lifecycle service.
//!
//! All auth flows run through [`AccountService`]: registration, email
//! verification, login, OTP password recovery, and session
//! authentication. Handlers stay thin; this module owns the ordering
//! rules the flows rely on:
//!
//! - a secret is persisted before its notification is attempted, and
//!   rolled back when delivery fails, so no account is left pointing at
//!   a secret its owner never received;
//! - recovery and resend lookups collapse unknown emails and
//!   wrong-state accounts into one shared rejection message;
//! - password changes stamp `password_changed_at`, which revokes every
//!   session token issued earlier.

use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info};

use super::secrets::{GeneratedSecret, digest_secret, generate_otp, generate_verification_token};
use super::state::AuthConfig;
use super::token::{SignedToken, TokenIssuer};
use crate::api::error::ApiError;
use crate::notify::{Notification, Notifier};
use crate::store::{Account, AccountFilter, AccountStore, NewAccount, StoreError};

pub(super) const MSG_VERIFICATION_SENT: &str = "We have sent a verification link to your email.";
pub(super) const MSG_OTP_SENT: &str = "We have sent a password reset code to your email.";
// One message for every failed account lookup in the resend and
// recovery flows, so the rejection does not reveal account state.
const MSG_ACCOUNT_INVALID: &str = "Invalid credentials.";
const MSG_LINK_INVALID: &str = "Verification link is invalid or has expired.";
const MSG_OTP_INVALID: &str = "Verification failed. Please check your code or request a new one.";

/// Which secret a rollback clears after a failed delivery.
#[derive(Clone, Copy, Debug)]
enum SecretPurpose {
    Verification,
    Reset,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenIssuer,
    base_url: String,
}

impl AccountService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            tokens: TokenIssuer::new(config.jwt_secret(), config.session_ttl_seconds()),
            base_url: config.base_url().to_string(),
        }
    }

    /// Create an unverified account and send the verification link.
    pub async fn register(
        &self,
        first_name: &str,
        second_name: Option<&str>,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(Account, &'static str), ApiError> {
        let first_name = validate_name(first_name, "First name")?;
        let second_name = second_name
            .map(|name| validate_name(name, "Second name"))
            .transpose()?;
        let email = validate_email(email)?;
        validate_password(password, password_confirm)?;

        let secret = generate_verification_token(Utc::now());
        let account = self
            .store
            .insert(NewAccount {
                email,
                first_name,
                second_name,
                password_hash: hash_password(password)?,
                email_verification: Some(secret.pending()),
            })
            .await?;

        info!(account_id = %account.id, "account registered");
        let account = self
            .dispatch_verification(account, &secret)
            .await?;
        Ok((account, MSG_VERIFICATION_SENT))
    }

    /// Replace the pending verification token and resend the link.
    ///
    /// Unknown and already-verified emails fail with the same generic
    /// rejection.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email);
        let Some(mut account) = self
            .store
            .find_one(AccountFilter::by_email(&email).verified(false))
            .await?
        else {
            return Err(ApiError::InvalidRequest(MSG_ACCOUNT_INVALID.to_string()));
        };

        let secret = generate_verification_token(Utc::now());
        account.email_verification = Some(secret.pending());
        self.store.save(&mut account).await?;
        self.dispatch_verification(account, &secret).await?;
        Ok(())
    }

    /// Consume a verification token and open the first session.
    pub async fn verify_email(&self, raw_token: &str) -> Result<(Account, SignedToken), ApiError> {
        let now = Utc::now();
        let filter = AccountFilter::new()
            .verified(false)
            .with_verification_digest(digest_secret(raw_token))
            .secrets_valid_at(now);
        let Some(mut account) = self.store.find_one(filter).await? else {
            return Err(ApiError::InvalidRequest(MSG_LINK_INVALID.to_string()));
        };

        account.is_verified = true;
        account.email_verification = None;
        self.store.save(&mut account).await?;
        info!(account_id = %account.id, "email verified");

        let token = self.tokens.issue(account.id, account.role)?;
        Ok((account, token))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, SignedToken), ApiError> {
        let email = normalize_email(email);
        let Some(account) = self.store.find_one(AccountFilter::by_email(&email)).await? else {
            return Err(ApiError::InvalidCredentials);
        };
        if !verify_password(password, &account.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }
        if !account.is_verified {
            return Err(ApiError::NotVerified);
        }

        let token = self.tokens.issue(account.id, account.role)?;
        Ok((account, token))
    }

    /// Mint a recovery OTP and send it. Unknown and not-yet-verified
    /// emails fail with the same generic rejection.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email);
        let Some(mut account) = self
            .store
            .find_one(AccountFilter::by_email(&email).verified(true))
            .await?
        else {
            return Err(ApiError::InvalidRequest(MSG_ACCOUNT_INVALID.to_string()));
        };

        let secret = generate_otp(Utc::now());
        account.password_reset = Some(secret.pending());
        self.store.save(&mut account).await?;

        let notification = Notification::recovery(
            &account.first_name,
            &account.email,
            secret.raw.clone(),
        );
        if let Err(err) = self.notifier.send(&notification).await {
            return Err(self.rollback_secret(account, SecretPurpose::Reset, &err).await);
        }
        Ok(())
    }

    /// Check an OTP without consuming it, so a client can confirm the
    /// code before asking for the new password.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Account, ApiError> {
        self.lookup_reset_account(email, otp).await
    }

    /// Consume the OTP, set the new password, and open a session.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(Account, SignedToken), ApiError> {
        validate_password(password, password_confirm)?;
        let mut account = self.lookup_reset_account(email, otp).await?;

        account.password_hash = hash_password(password)?;
        account.password_changed_at = Some(Utc::now());
        account.password_reset = None;
        self.store.save(&mut account).await?;
        info!(account_id = %account.id, "password reset");

        let token = self.tokens.issue(account.id, account.role)?;
        Ok((account, token))
    }

    /// Resolve a presented session token into its live account.
    pub async fn authenticate(&self, token: &str) -> Result<Account, ApiError> {
        let claims = self.tokens.verify(token)?;
        let Some(account) = self.store.find_one(AccountFilter::by_id(claims.sub)).await? else {
            return Err(ApiError::Unauthenticated);
        };
        if let Some(changed_at) = account.password_changed_at {
            if changed_at.timestamp() > claims.iat {
                return Err(ApiError::SessionRevoked);
            }
        }
        Ok(account)
    }

    pub async fn list_accounts(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, u64), ApiError> {
        let accounts = self.store.list(limit, offset).await?;
        let total = self.store.count().await?;
        Ok((accounts, total))
    }

    async fn lookup_reset_account(&self, email: &str, otp: &str) -> Result<Account, ApiError> {
        let email = normalize_email(email);
        let filter = AccountFilter::by_email(&email)
            .verified(true)
            .with_reset_digest(digest_secret(otp))
            .secrets_valid_at(Utc::now());
        self.store
            .find_one(filter)
            .await?
            .ok_or_else(|| ApiError::InvalidRequest(MSG_OTP_INVALID.to_string()))
    }

    async fn dispatch_verification(
        &self,
        account: Account,
        secret: &GeneratedSecret,
    ) -> Result<Account, ApiError> {
        let url = format!("{}/api/v1/auth/verify-email/{}", self.base_url, secret.raw);
        let notification = Notification::verification(&account.first_name, &account.email, url);
        if let Err(err) = self.notifier.send(&notification).await {
            return Err(self
                .rollback_secret(account, SecretPurpose::Verification, &err)
                .await);
        }
        Ok(account)
    }

    /// Clear the secret that was never delivered, then surface the
    /// delivery failure. A failed rollback is logged but does not change
    /// the outward answer; the secret expires on its own.
    async fn rollback_secret(
        &self,
        mut account: Account,
        purpose: SecretPurpose,
        cause: &anyhow::Error,
    ) -> ApiError {
        error!(account_id = %account.id, "notification delivery failed: {cause:?}");
        match purpose {
            SecretPurpose::Verification => account.email_verification = None,
            SecretPurpose::Reset => account.password_reset = None,
        }
        if let Err(err) = self.store.save(&mut account).await {
            error!(account_id = %account.id, "secret rollback failed: {err}");
        }
        ApiError::DeliveryFailed
    }

    #[cfg(test)]
    pub(super) fn issue_token_at(
        &self,
        account_id: uuid::Uuid,
        role: crate::store::Role,
        at: chrono::DateTime<Utc>,
    ) -> Result<SignedToken, ApiError> {
        self.tokens.issue_at(account_id, role, at)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(ApiError::InvalidRequest(
            "Please provide a valid email address.".to_string(),
        ))
    }
}

fn validate_name(name: &str, label: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if (3..=25).contains(&name.chars().count()) {
        Ok(name.to_string())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "{label} must be between 3 and 25 characters."
        )))
    }
}

fn validate_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if !(8..=30).contains(&password.chars().count()) {
        return Err(ApiError::InvalidRequest(
            "Password must be between 8 and 30 characters.".to_string(),
        ));
    }
    if password != confirm {
        return Err(ApiError::InvalidRequest(
            "Passwords do not match.".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::password_hash::{SaltString, rand_core::OsRng};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("password hashing failed: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationBody;
    use crate::store::{MemoryAccountStore, Role};
    use chrono::Duration;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_next(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            if self.fail.swap(false, Ordering::SeqCst) {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Harness {
        service: AccountService,
        store: Arc<MemoryAccountStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryAccountStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AuthConfig::new(
            "http://localhost:8080".to_string(),
            SecretString::from("test-secret"),
        );
        let service = AccountService::new(store.clone(), notifier.clone(), &config);
        Harness {
            service,
            store,
            notifier,
        }
    }

    async fn register(harness: &Harness, email: &str) -> Account {
        harness
            .service
            .register("Alice", None, email, "password123", "password123")
            .await
            .unwrap()
            .0
    }

    fn last_verification_token(notifier: &RecordingNotifier) -> String {
        let sent = notifier.sent();
        let last = sent.last().expect("no notification sent");
        match &last.body {
            NotificationBody::VerificationLink { url } => {
                url.rsplit('/').next().unwrap().to_string()
            }
            NotificationBody::RecoveryCode { .. } => panic!("expected verification link"),
        }
    }

    fn last_otp(notifier: &RecordingNotifier) -> String {
        let sent = notifier.sent();
        let last = sent.last().expect("no notification sent");
        match &last.body {
            NotificationBody::RecoveryCode { code } => code.clone(),
            NotificationBody::VerificationLink { .. } => panic!("expected recovery code"),
        }
    }

    async fn registered_and_verified(harness: &Harness, email: &str) -> Account {
        register(harness, email).await;
        let token = last_verification_token(&harness.notifier);
        harness.service.verify_email(&token).await.unwrap().0
    }

    #[tokio::test]
    async fn register_creates_unverified_account_and_sends_link() {
        let harness = harness();
        let (account, message) = harness
            .service
            .register(
                " Alice ",
                Some("Liddell"),
                " Alice@Example.COM ",
                "password123",
                "password123",
            )
            .await
            .unwrap();

        assert!(!account.is_verified);
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.first_name, "Alice");
        assert_eq!(message, MSG_VERIFICATION_SENT);

        // The link carries the raw token; only its digest is at rest.
        let token = last_verification_token(&harness.notifier);
        assert_eq!(token.len(), 64);
        let stored = harness
            .store
            .find_one(AccountFilter::by_email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.email_verification.unwrap().digest,
            digest_secret(&token)
        );
        assert!(!verify_password("wrong", &stored.password_hash));
        assert!(verify_password("password123", &stored.password_hash));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let harness = harness();
        register(&harness, "alice@example.com").await;
        let second = harness
            .service
            .register("Alice", None, "ALICE@example.com", "password123", "password123")
            .await;
        assert!(matches!(second, Err(ApiError::Conflict)));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let harness = harness();
        let cases: &[(&str, Option<&str>, &str, &str, &str)] = &[
            ("Al", None, "a@example.com", "password123", "password123"),
            ("Alice", Some("L"), "a@example.com", "password123", "password123"),
            ("Alice", None, "not-an-email", "password123", "password123"),
            ("Alice", None, "a@example.com", "short", "short"),
            ("Alice", None, "a@example.com", "password123", "password456"),
        ];
        for (first, second, email, password, confirm) in cases {
            let result = harness
                .service
                .register(first, *second, email, password, confirm)
                .await;
            assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
        }
        assert!(harness.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn register_rolls_back_secret_on_delivery_failure() {
        let harness = harness();
        harness.notifier.fail_next();
        let result = harness
            .service
            .register("Alice", None, "alice@example.com", "password123", "password123")
            .await;
        assert!(matches!(result, Err(ApiError::DeliveryFailed)));

        // The account survives, but without a dangling secret.
        let stored = harness
            .store
            .find_one(AccountFilter::by_email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.email_verification.is_none());
        assert!(!stored.is_verified);
    }

    #[tokio::test]
    async fn verify_email_opens_session_and_consumes_token() {
        let harness = harness();
        register(&harness, "alice@example.com").await;
        let token = last_verification_token(&harness.notifier);

        let (account, session) = harness.service.verify_email(&token).await.unwrap();
        assert!(account.is_verified);
        assert!(account.email_verification.is_none());

        let authed = harness.service.authenticate(&session.token).await.unwrap();
        assert_eq!(authed.id, account.id);

        // Second use of the same link fails.
        let again = harness.service.verify_email(&token).await;
        assert!(matches!(again, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn verify_email_rejects_expired_token() {
        let harness = harness();
        register(&harness, "alice@example.com").await;
        let token = last_verification_token(&harness.notifier);

        let mut stored = harness
            .store
            .find_one(AccountFilter::by_email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        let mut secret = stored.email_verification.clone().unwrap();
        secret.expires_at = Utc::now() - Duration::minutes(1);
        stored.email_verification = Some(secret);
        harness.store.save(&mut stored).await.unwrap();

        assert!(matches!(
            harness.service.verify_email(&token).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn resend_invalidates_previous_token() {
        let harness = harness();
        register(&harness, "alice@example.com").await;
        let first = last_verification_token(&harness.notifier);

        harness
            .service
            .resend_verification("alice@example.com")
            .await
            .unwrap();
        let second = last_verification_token(&harness.notifier);
        assert_ne!(first, second);

        assert!(matches!(
            harness.service.verify_email(&first).await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(harness.service.verify_email(&second).await.is_ok());
    }

    #[tokio::test]
    async fn resend_rejects_unknown_and_verified_email_uniformly() {
        let harness = harness();
        let unknown = match harness.service.resend_verification("nobody@example.com").await {
            Err(ApiError::InvalidRequest(message)) => message,
            other => panic!("expected InvalidRequest, got {other:?}"),
        };
        assert!(harness.notifier.sent().is_empty());

        registered_and_verified(&harness, "alice@example.com").await;
        let sent_before = harness.notifier.sent().len();
        let verified = match harness.service.resend_verification("alice@example.com").await {
            Err(ApiError::InvalidRequest(message)) => message,
            other => panic!("expected InvalidRequest, got {other:?}"),
        };
        assert_eq!(harness.notifier.sent().len(), sent_before);

        // Nonexistent and already-verified read identically.
        assert_eq!(unknown, verified);
    }

    #[tokio::test]
    async fn login_checks_password_and_verification() {
        let harness = harness();
        register(&harness, "alice@example.com").await;

        // Unverified accounts with correct credentials get a distinct
        // answer; wrong credentials stay uniform.
        assert!(matches!(
            harness.service.login("alice@example.com", "password123").await,
            Err(ApiError::NotVerified)
        ));
        assert!(matches!(
            harness.service.login("alice@example.com", "wrongpass1").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            harness.service.login("nobody@example.com", "password123").await,
            Err(ApiError::InvalidCredentials)
        ));

        let token = last_verification_token(&harness.notifier);
        harness.service.verify_email(&token).await.unwrap();
        let (account, session) = harness
            .service
            .login("ALICE@example.com ", "password123")
            .await
            .unwrap();
        assert_eq!(account.email, "alice@example.com");
        assert!(harness.service.authenticate(&session.token).await.is_ok());
    }

    #[tokio::test]
    async fn forgot_password_sends_six_digit_code() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;

        harness
            .service
            .forgot_password("alice@example.com")
            .await
            .unwrap();
        let otp = last_otp(&harness.notifier);
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));

        let account = harness.service.verify_otp("alice@example.com", &otp).await.unwrap();
        assert_eq!(account.email, "alice@example.com");
    }

    #[tokio::test]
    async fn forgot_password_rejects_unknown_and_unverified_uniformly() {
        let harness = harness();
        let unknown = match harness.service.forgot_password("nobody@example.com").await {
            Err(ApiError::InvalidRequest(message)) => message,
            other => panic!("expected InvalidRequest, got {other:?}"),
        };

        register(&harness, "bob@example.com").await;
        let sent_before = harness.notifier.sent().len();
        let unverified = match harness.service.forgot_password("bob@example.com").await {
            Err(ApiError::InvalidRequest(message)) => message,
            other => panic!("expected InvalidRequest, got {other:?}"),
        };
        assert_eq!(harness.notifier.sent().len(), sent_before);
        assert_eq!(unknown, unverified);
    }

    #[tokio::test]
    async fn forgot_password_rolls_back_on_delivery_failure() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;

        harness.notifier.fail_next();
        let result = harness.service.forgot_password("alice@example.com").await;
        assert!(matches!(result, Err(ApiError::DeliveryFailed)));

        let stored = harness
            .store
            .find_one(AccountFilter::by_email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.password_reset.is_none());
    }

    #[tokio::test]
    async fn wrong_or_expired_otp_is_rejected() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;
        harness
            .service
            .forgot_password("alice@example.com")
            .await
            .unwrap();
        let otp = last_otp(&harness.notifier);

        let wrong = if otp == "000000" { "000001" } else { "000000" };
        assert!(matches!(
            harness.service.verify_otp("alice@example.com", wrong).await,
            Err(ApiError::InvalidRequest(_))
        ));

        let mut stored = harness
            .store
            .find_one(AccountFilter::by_email("alice@example.com"))
            .await
            .unwrap()
            .unwrap();
        let mut secret = stored.password_reset.clone().unwrap();
        secret.expires_at = Utc::now() - Duration::minutes(1);
        stored.password_reset = Some(secret);
        harness.store.save(&mut stored).await.unwrap();

        assert!(matches!(
            harness.service.verify_otp("alice@example.com", &otp).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn reset_password_swaps_credentials_and_consumes_otp() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;
        harness
            .service
            .forgot_password("alice@example.com")
            .await
            .unwrap();
        let otp = last_otp(&harness.notifier);

        let (account, session) = harness
            .service
            .reset_password("alice@example.com", &otp, "newpassword1", "newpassword1")
            .await
            .unwrap();
        assert!(account.password_reset.is_none());
        assert!(account.password_changed_at.is_some());
        assert!(harness.service.authenticate(&session.token).await.is_ok());

        assert!(matches!(
            harness.service.login("alice@example.com", "password123").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(harness
            .service
            .login("alice@example.com", "newpassword1")
            .await
            .is_ok());

        // The OTP is gone with the reset.
        assert!(matches!(
            harness
                .service
                .reset_password("alice@example.com", &otp, "another123", "another123")
                .await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn reset_password_validates_before_touching_the_otp() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;
        harness
            .service
            .forgot_password("alice@example.com")
            .await
            .unwrap();
        let otp = last_otp(&harness.notifier);

        let result = harness
            .service
            .reset_password("alice@example.com", &otp, "newpassword1", "different1")
            .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));

        // The OTP survives a validation failure.
        assert!(harness
            .service
            .verify_otp("alice@example.com", &otp)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn password_change_revokes_earlier_sessions() {
        let harness = harness();
        let account = registered_and_verified(&harness, "alice@example.com").await;

        let old_session = harness
            .service
            .issue_token_at(account.id, Role::User, Utc::now() - Duration::seconds(10))
            .unwrap();
        assert!(harness.service.authenticate(&old_session.token).await.is_ok());

        harness
            .service
            .forgot_password("alice@example.com")
            .await
            .unwrap();
        let otp = last_otp(&harness.notifier);
        let (_, new_session) = harness
            .service
            .reset_password("alice@example.com", &otp, "newpassword1", "newpassword1")
            .await
            .unwrap();

        assert!(matches!(
            harness.service.authenticate(&old_session.token).await,
            Err(ApiError::SessionRevoked)
        ));
        assert!(harness.service.authenticate(&new_session.token).await.is_ok());
    }

    #[tokio::test]
    async fn authenticate_rejects_garbage_and_deactivated_accounts() {
        let harness = harness();
        assert!(matches!(
            harness.service.authenticate("not-a-token").await,
            Err(ApiError::TokenInvalid)
        ));

        let mut account = registered_and_verified(&harness, "alice@example.com").await;
        let (_, session) = harness
            .service
            .login("alice@example.com", "password123")
            .await
            .unwrap();
        account.is_active = false;
        harness.store.save(&mut account).await.unwrap();
        assert!(matches!(
            harness.service.authenticate(&session.token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn valid_email_checks_format() {
        assert!(valid_email("user@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@example.com"));
        assert!(!valid_email("user@example"));
    }

    #[tokio::test]
    async fn list_accounts_reports_totals() {
        let harness = harness();
        registered_and_verified(&harness, "alice@example.com").await;
        registered_and_verified(&harness, "bob@example.com").await;

        let (accounts, total) = harness.service.list_accounts(1, 0).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(total, 2);
    }
}
