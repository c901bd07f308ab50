//! The session state machine.
//!
//! `SessionAuthority` is the only writer of the [`TokenStore`]. It owns the
//! login, renewal and logout transitions and the proactive renewal policy.
//! Deciding to log out after a failed renewal is left to callers; the only
//! caller that does so is the request pipeline's 401 recovery.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use super::identity::{IdentityProvider, LoginCredentials};
use super::session::{Identity, Session};
use super::store::TokenStore;
use super::AuthError;
use crate::hooks::{LogNotifier, LoginRoute, Navigator, Notifier};

/// Renew this long before the access token expires.
/// Comfortably more than one round trip plus draining queued requests.
pub const RENEWAL_THRESHOLD_MINUTES: i64 = 5;

/// Notice shown when a login is required again
pub const RELOGIN_NOTICE: &str = "Please log in again";

pub struct SessionAuthority {
    store: TokenStore,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    // Serializes refresh grants: at most one is ever in flight
    renewal: AsyncMutex<()>,
}

impl SessionAuthority {
    pub fn new(store: TokenStore, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            notifier: Arc::new(LogNotifier),
            navigator: Arc::new(LoginRoute::default()),
            renewal: AsyncMutex::new(()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Load the persisted session, if a complete one exists.
    pub fn restore(&self) -> bool {
        self.store.restore()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn has_token(&self) -> bool {
        self.store.has_token()
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    pub fn snapshot(&self) -> Session {
        self.store.snapshot()
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.store.time_until_expiry()
    }

    fn renewal_threshold() -> Duration {
        Duration::minutes(RENEWAL_THRESHOLD_MINUTES)
    }

    /// Exchange username/password for a new session.
    ///
    /// On failure any previous session is left exactly as it was.
    pub async fn login(&self, credentials: &LoginCredentials, remember: bool) -> Result<Session, AuthError> {
        info!(username = %credentials.username, remember, "Logging in");

        let envelope = match self.identity.password_grant(credentials).await {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(e);
            }
        };

        let identity = Some(Identity {
            name: credentials.username.clone(),
        });
        let mut session = Session::from_envelope(&envelope, identity, remember);
        session.tab_active = self.store.snapshot().tab_active;
        self.store.replace(session.clone());

        info!(expires_in = envelope.expires_in, "Login successful");
        Ok(session)
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// Never contacts the endpoint when the session is not remembered.
    /// Errors are returned as-is; the session is not touched on failure.
    pub async fn renew(&self) -> Result<bool, AuthError> {
        if !self.store.snapshot().remember {
            debug!("Renewal skipped, session is not remembered");
            return Err(AuthError::RenewalDisabled);
        }

        let _guard = self.renewal.lock().await;

        // Read after taking the guard so a queued renewal uses the newest token
        let refresh_token = self.store.snapshot().refresh_token;
        if refresh_token.is_empty() {
            warn!("Renewal requested without a refresh token");
            return Err(AuthError::RenewalFailed("no refresh token available".to_string()));
        }

        let envelope = match self.identity.refresh_grant(&refresh_token).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Token renewal failed");
                return Err(e);
            }
        };

        let applied = self.store.update(|session| {
            if !session.has_token() {
                // Logged out while the grant was in flight
                return Err(AuthError::SessionExpired);
            }
            if session.refresh_token != refresh_token {
                // A login replaced the session meanwhile; keep the newer one
                return Ok(false);
            }
            session.apply_renewal(&envelope);
            Ok(true)
        })?;

        if applied {
            info!(expires_in = envelope.expires_in, "Token renewed");
        } else {
            debug!("Discarded renewal result for a replaced session");
        }
        Ok(true)
    }

    /// Proactive renewal decision point.
    ///
    /// Renews when forced, or when the client is in the foreground, the
    /// session is remembered and expiry is within the threshold. Renewal
    /// failures are logged and swallowed. Returns whether the access token
    /// is usable right now.
    pub async fn ensure_fresh(&self, force: bool) -> bool {
        let session = self.store.snapshot();
        if !session.has_token() {
            return false;
        }

        let remaining = session.time_until_expiry();
        let wanted = force
            || (session.tab_active && session.remember && session.needs_refresh(Self::renewal_threshold()));

        if wanted {
            debug!(
                remaining_secs = remaining.num_seconds(),
                force,
                "Token close to expiry, renewing"
            );
            if let Err(e) = self.renew().await {
                warn!(error = %e, "Proactive renewal failed");
            }
        }

        self.store.time_until_expiry() > Duration::zero()
    }

    /// The client came back to the foreground.
    ///
    /// Only an already-expired, remembered session is renewed here; tokens
    /// that are merely close to expiry are left for `ensure_fresh`.
    pub async fn on_foreground_resume(&self) -> bool {
        let session = self.store.snapshot();
        if !session.has_token() {
            return false;
        }

        if session.is_expired() && session.remember {
            info!("Token expired while in background, renewing");
            if let Err(e) = self.renew().await {
                warn!(error = %e, "Renewal on resume failed");
            }
        }

        self.store.is_authenticated()
    }

    /// Gate for screens that need a session.
    ///
    /// Lets authenticated users through, otherwise gives proactive renewal
    /// one chance before sending the user to the login entry point.
    pub async fn guard_protected(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        if self.ensure_fresh(false).await {
            return true;
        }
        if !self.navigator.at_login() {
            self.navigator.to_login();
        }
        false
    }

    /// Drop the session unconditionally.
    ///
    /// Safe to call repeatedly; beyond the first call only `reason` is
    /// shown again.
    pub fn logout(&self, reason: Option<&str>) {
        if self.store.has_token() {
            info!("Logging out");
        } else {
            debug!("Logout requested without a session");
        }

        self.store.clear();

        if let Some(reason) = reason {
            self.notifier.notify(reason);
        }
        if !self.navigator.at_login() {
            self.navigator.to_login();
        }
    }

    pub(crate) fn set_tab_active(&self, active: bool) {
        self.store.set_tab_active(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionRecord;
    use crate::auth::store::MemoryStorage;
    use crate::test_support::{CountingNavigator, FakeIdentity, RecordingNotifier};

    struct Harness {
        authority: SessionAuthority,
        identity: Arc<FakeIdentity>,
        storage: MemoryStorage,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<CountingNavigator>,
    }

    fn harness(identity: FakeIdentity) -> Harness {
        let identity = Arc::new(identity);
        let storage = MemoryStorage::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(CountingNavigator::default());
        let authority = SessionAuthority::new(TokenStore::new(Box::new(storage.clone())), identity.clone())
            .with_notifier(notifier.clone())
            .with_navigator(navigator.clone());
        Harness {
            authority,
            identity,
            storage,
            notifier,
            navigator,
        }
    }

    fn credentials() -> LoginCredentials {
        LoginCredentials::new("a", "b")
    }

    #[tokio::test]
    async fn test_login_sets_and_persists_session() {
        let h = harness(FakeIdentity::new(1800));
        let before = chrono::Utc::now();
        let session = h.authority.login(&credentials(), true).await.unwrap();
        let after = chrono::Utc::now();

        assert!(h.authority.is_authenticated());
        assert_eq!(session.access_token, "T1");
        assert_eq!(session.refresh_token, "R1");
        assert_eq!(session.identity.as_ref().map(|i| i.name.as_str()), Some("a"));

        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + Duration::milliseconds(1_800_000));
        assert!(expires_at <= after + Duration::milliseconds(1_800_000));

        let record: SessionRecord = serde_json::from_str(&h.storage.contents().unwrap()).unwrap();
        assert_eq!(record.auth_token.as_deref(), Some("T1"));
        assert_eq!(record.refresh_token.as_deref(), Some("R1"));
        assert_eq!(record.token_expiry, Some(expires_at.timestamp_millis().to_string()));
        assert_eq!(record.auto_login.as_deref(), Some("true"));
        assert_eq!(record.user_info.map(|i| i.name).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_session() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();

        let err = h
            .authority
            .login(&LoginCredentials::new("a", "wrong"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialsRejected(_)));

        let session = h.authority.snapshot();
        assert_eq!(session.access_token, "T1");
        assert!(session.remember);
        assert!(h.authority.is_authenticated());
    }

    #[tokio::test]
    async fn test_renew_without_remember_never_calls_endpoint() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), false).await.unwrap();

        let err = h.authority.renew().await.unwrap_err();
        assert!(matches!(err, AuthError::RenewalDisabled));
        assert_eq!(h.identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_renew_replaces_tokens_in_place() {
        let h = harness(FakeIdentity::new(60));
        h.authority.login(&credentials(), true).await.unwrap();
        h.identity.set_expires_in(1800);

        assert!(h.authority.renew().await.unwrap());
        let session = h.authority.snapshot();
        assert_eq!(session.access_token, "T2");
        assert_eq!(session.refresh_token, "R2");
        assert_eq!(session.identity.as_ref().map(|i| i.name.as_str()), Some("a"));
        assert!(session.remember);
        assert!(session.minutes_until_expiry() >= 29);
        assert_eq!(h.identity.last_refresh_token().as_deref(), Some("R1"));

        let record: SessionRecord = serde_json::from_str(&h.storage.contents().unwrap()).unwrap();
        assert_eq!(record.auth_token.as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_renew_failure_leaves_session_alone() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();
        h.identity.fail_refresh(true);

        let err = h.authority.renew().await.unwrap_err();
        assert!(matches!(err, AuthError::RenewalFailed(_)));
        assert_eq!(h.authority.snapshot().access_token, "T1");
        assert_eq!(h.navigator.redirects(), 0);
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_fresh_without_token() {
        let h = harness(FakeIdentity::new(1800));
        assert!(!h.authority.ensure_fresh(false).await);
        assert!(!h.authority.ensure_fresh(true).await);
        assert_eq!(h.identity.refresh_calls(), 0);
        assert_eq!(h.navigator.redirects(), 0);
    }

    #[tokio::test]
    async fn test_ensure_fresh_renews_near_expiry() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), true).await.unwrap();

        assert!(h.authority.ensure_fresh(false).await);
        assert_eq!(h.identity.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_fresh_reports_validity_when_renewal_fails() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), true).await.unwrap();
        h.identity.fail_refresh(true);

        assert!(h.authority.ensure_fresh(false).await);
        assert_eq!(h.identity.refresh_calls(), 1);
        assert_eq!(h.authority.snapshot().access_token, "T1");
    }

    #[tokio::test]
    async fn test_ensure_fresh_skips_when_far_from_expiry() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();

        assert!(h.authority.ensure_fresh(false).await);
        assert_eq!(h.identity.refresh_calls(), 0);

        assert!(h.authority.ensure_fresh(true).await);
        assert_eq!(h.identity.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_fresh_in_background_never_renews() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), true).await.unwrap();
        h.authority.set_tab_active(false);

        assert!(h.authority.ensure_fresh(false).await);
        assert_eq!(h.identity.refresh_calls(), 0);

        let expired = harness(FakeIdentity::new(0));
        expired.authority.login(&credentials(), true).await.unwrap();
        expired.authority.set_tab_active(false);
        assert!(!expired.authority.ensure_fresh(false).await);
        assert_eq!(expired.identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_fresh_without_remember_never_renews() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), false).await.unwrap();

        assert!(h.authority.ensure_fresh(false).await);
        assert_eq!(h.identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_foreground_resume_renews_expired_token() {
        let h = harness(FakeIdentity::new(0));
        h.authority.login(&credentials(), true).await.unwrap();
        h.identity.set_expires_in(1800);

        assert!(h.authority.on_foreground_resume().await);
        assert_eq!(h.identity.refresh_calls(), 1);
        assert_eq!(h.authority.snapshot().access_token, "T2");
    }

    #[tokio::test]
    async fn test_foreground_resume_leaves_valid_token() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), true).await.unwrap();

        assert!(h.authority.on_foreground_resume().await);
        assert_eq!(h.identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_foreground_resume_without_remember() {
        let h = harness(FakeIdentity::new(0));
        h.authority.login(&credentials(), false).await.unwrap();

        assert!(!h.authority.on_foreground_resume().await);
        assert_eq!(h.identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();
        h.navigator.leave_login();

        h.authority.logout(Some(RELOGIN_NOTICE));
        assert!(!h.authority.has_token());
        assert!(h.storage.contents().is_none());
        assert_eq!(h.navigator.redirects(), 1);

        h.authority.logout(Some(RELOGIN_NOTICE));
        assert_eq!(h.navigator.redirects(), 1);
        assert_eq!(h.notifier.messages(), vec![RELOGIN_NOTICE, RELOGIN_NOTICE]);
    }

    #[tokio::test]
    async fn test_logout_without_reason_is_silent() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();
        h.authority.logout(None);
        assert!(h.notifier.messages().is_empty());
        assert!(!h.authority.is_authenticated());
    }

    #[tokio::test]
    async fn test_renewal_after_logout_does_not_resurrect() {
        let h = harness(FakeIdentity::new(200));
        h.authority.login(&credentials(), true).await.unwrap();
        let gate = h.identity.hold_refresh();

        let renew = h.authority.renew();
        let logout = async {
            while h.identity.refresh_calls() == 0 {
                tokio::task::yield_now().await;
            }
            h.authority.logout(None);
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(renew, logout);

        assert!(matches!(result, Err(AuthError::SessionExpired)));
        assert!(!h.authority.has_token());
        assert!(h.storage.contents().is_none());
    }

    #[tokio::test]
    async fn test_guard_protected() {
        let h = harness(FakeIdentity::new(1800));
        h.navigator.leave_login();
        assert!(!h.authority.guard_protected().await);
        assert_eq!(h.navigator.redirects(), 1);

        h.authority.login(&credentials(), true).await.unwrap();
        h.navigator.leave_login();
        assert!(h.authority.guard_protected().await);
        assert_eq!(h.navigator.redirects(), 1);
    }

    #[tokio::test]
    async fn test_restore_then_authenticated() {
        let h = harness(FakeIdentity::new(1800));
        h.authority.login(&credentials(), true).await.unwrap();

        let fresh = SessionAuthority::new(
            TokenStore::new(Box::new(h.storage.clone())),
            h.identity.clone(),
        );
        assert!(!fresh.is_authenticated());
        assert!(fresh.restore());
        assert!(fresh.is_authenticated());
        assert_eq!(fresh.access_token().as_deref(), Some("T1"));
    }
}
