//! Fakes for the identity endpoint, the HTTP transport and the UI hooks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::error::ApiError;
use crate::api::transport::{ApiRequest, ApiResponse, Transport};
use crate::auth::identity::{IdentityProvider, LoginCredentials, TokenEnvelope};
use crate::auth::AuthError;
use crate::hooks::{Navigator, Notifier};

/// Identity endpoint that mints `T<n>`/`R<n>` pairs.
///
/// The password `"wrong"` is rejected. Refresh grants can be made to fail or
/// to wait on a gate so tests can hold a renewal open.
pub(crate) struct FakeIdentity {
    expires_in: AtomicI64,
    issued: AtomicUsize,
    password_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    last_refresh_token: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeIdentity {
    pub fn new(expires_in: i64) -> Self {
        Self {
            expires_in: AtomicI64::new(expires_in),
            issued: AtomicUsize::new(0),
            password_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            last_refresh_token: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    pub fn set_expires_in(&self, expires_in: i64) {
        self.expires_in.store(expires_in, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Make refresh grants wait until the returned gate is notified.
    pub fn hold_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn password_calls(&self) -> usize {
        self.password_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    fn mint(&self) -> TokenEnvelope {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        TokenEnvelope {
            access_token: format!("T{}", n),
            token_type: "bearer".to_string(),
            expires_in: self.expires_in.load(Ordering::SeqCst),
            refresh_token: format!("R{}", n),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn password_grant(&self, credentials: &LoginCredentials) -> Result<TokenEnvelope, AuthError> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        if credentials.password == "wrong" {
            return Err(AuthError::CredentialsRejected("Invalid username or password".to_string()));
        }
        Ok(self.mint())
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenEnvelope, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;

        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::RenewalFailed("Invalid refresh token".to_string()));
        }
        Ok(self.mint())
    }
}

/// Backend that answers 200 for accepted tokens and 401 for anything else.
/// Individual paths can be pinned to a canned response.
#[derive(Default)]
pub(crate) struct FakeTransport {
    accepted: Mutex<HashSet<String>>,
    canned: Mutex<HashMap<String, ApiResponse>>,
    seen: Mutex<Vec<(ApiRequest, Option<String>)>>,
}

impl FakeTransport {
    pub fn accepting(tokens: &[&str]) -> Self {
        let transport = Self::default();
        transport
            .accepted
            .lock()
            .unwrap()
            .extend(tokens.iter().map(|t| t.to_string()));
        transport
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.canned.lock().unwrap().insert(
            path.to_string(),
            ApiResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn requests_seen(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.clone(), token.map(str::to_string)));

        if let Some(response) = self.canned.lock().unwrap().get(&request.path) {
            return Ok(response.clone());
        }

        let accepted = token
            .map(|t| self.accepted.lock().unwrap().contains(t))
            .unwrap_or(false);
        if accepted {
            Ok(ApiResponse {
                status: 200,
                body: serde_json::json!({ "path": request.path }).to_string(),
            })
        } else {
            Ok(ApiResponse {
                status: 401,
                body: r#"{"detail": "Could not validate credentials"}"#.to_string(),
            })
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Navigator that counts redirects. Starts at the login entry point.
pub(crate) struct CountingNavigator {
    at_login: AtomicBool,
    redirects: AtomicUsize,
}

impl Default for CountingNavigator {
    fn default() -> Self {
        Self {
            at_login: AtomicBool::new(true),
            redirects: AtomicUsize::new(0),
        }
    }
}

impl CountingNavigator {
    pub fn leave_login(&self) {
        self.at_login.store(false, Ordering::SeqCst);
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn at_login(&self) -> bool {
        self.at_login.load(Ordering::SeqCst)
    }

    fn to_login(&self) {
        self.at_login.store(true, Ordering::SeqCst);
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}
