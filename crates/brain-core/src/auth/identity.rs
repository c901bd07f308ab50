//! Client for the backend's OAuth2-style `/login` endpoint.
//!
//! The same endpoint serves both grants. Requests are form-encoded and the
//! response is always the same token envelope.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::AuthError;
use crate::api::error::detail_messages;

/// Path of the grant endpoint, relative to the API base URL
pub const LOGIN_PATH: &str = "/login";

/// Username/password plus the optional OAuth2 client fields.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Form fields for the password grant. Empty optionals are left out.
    pub fn password_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("grant_type", "password".to_string()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ];
        let optional = [
            ("scope", &self.scope),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                form.push((key, value.clone()));
            }
        }
        form
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Form fields for the refresh grant.
pub fn refresh_form(refresh_token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
    ]
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenEnvelope {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds
    pub expires_in: i64,
    pub refresh_token: String,
}

impl TokenEnvelope {
    pub fn expires_at_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in)
    }

    fn validate(self) -> Result<Self, String> {
        if self.access_token.is_empty() {
            return Err("access_token is empty".to_string());
        }
        if self.refresh_token.is_empty() {
            return Err("refresh_token is empty".to_string());
        }
        if !self.token_type.is_empty() && !self.token_type.eq_ignore_ascii_case("bearer") {
            debug!(token_type = %self.token_type, "Unexpected token type, using as bearer");
        }
        Ok(self)
    }
}

impl std::fmt::Debug for TokenEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEnvelope")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// The identity endpoint, seen from the session authority.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn password_grant(&self, credentials: &LoginCredentials) -> Result<TokenEnvelope, AuthError>;

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenEnvelope, AuthError>;
}

/// `IdentityProvider` over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    token_url: String,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH),
        }
    }

    async fn post_form(&self, form: &[(&'static str, String)]) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
    }

    async fn read_envelope(response: reqwest::Response) -> Result<TokenEnvelope, AuthError> {
        let envelope: TokenEnvelope = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        envelope.validate().map_err(AuthError::InvalidResponse)
    }

    async fn failure_message(response: reqwest::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        (status, detail_messages(&body).join("; "))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn password_grant(&self, credentials: &LoginCredentials) -> Result<TokenEnvelope, AuthError> {
        debug!(username = %credentials.username, "Requesting password grant");
        let response = self.post_form(&credentials.password_form()).await?;

        if response.status().is_success() {
            return Self::read_envelope(response).await;
        }

        let (status, message) = Self::failure_message(response).await;
        error!(status, message = %message, "Password grant rejected");
        match status {
            400..=499 => Err(AuthError::CredentialsRejected(message)),
            _ => Err(AuthError::Endpoint { status, message }),
        }
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenEnvelope, AuthError> {
        debug!("Requesting refresh grant");
        let response = self
            .post_form(&refresh_form(refresh_token))
            .await
            .map_err(|e| AuthError::RenewalFailed(e.to_string()))?;

        if response.status().is_success() {
            return Self::read_envelope(response)
                .await
                .map_err(|e| AuthError::RenewalFailed(e.to_string()));
        }

        let (status, message) = Self::failure_message(response).await;
        error!(status, message = %message, "Refresh grant rejected");
        Err(AuthError::RenewalFailed(format!("status {}: {}", status, message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_form_minimal() {
        let credentials = LoginCredentials::new("a", "b");
        let form = credentials.password_form();
        assert_eq!(
            form,
            vec![
                ("grant_type", "password".to_string()),
                ("username", "a".to_string()),
                ("password", "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_password_form_includes_client_fields() {
        let credentials = LoginCredentials {
            scope: Some("admin".to_string()),
            client_id: Some("console".to_string()),
            client_secret: Some(String::new()),
            ..LoginCredentials::new("a", "b")
        };
        let form = credentials.password_form();
        assert!(form.contains(&("scope", "admin".to_string())));
        assert!(form.contains(&("client_id", "console".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "client_secret"));
    }

    #[test]
    fn test_refresh_form() {
        assert_eq!(
            refresh_form("R1"),
            vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", "R1".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_envelope() {
        let json = r#"{"access_token": "T1", "refresh_token": "R1", "expires_in": 1800, "token_type": "bearer"}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        let envelope = envelope.validate().unwrap();
        assert_eq!(envelope.expires_in, 1800);

        let now = Utc::now();
        assert_eq!((envelope.expires_at_from(now) - now).num_milliseconds(), 1_800_000);
    }

    #[test]
    fn test_envelope_without_access_token_is_invalid() {
        let json = r#"{"access_token": "", "refresh_token": "R1", "expires_in": 1800}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials = LoginCredentials::new("ops", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));

        let envelope = TokenEnvelope {
            access_token: "secret-access".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 60,
            refresh_token: "secret-refresh".to_string(),
        };
        let debug = format!("{:?}", envelope);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_token_url() {
        let provider = HttpIdentityProvider::new(Client::new(), "http://localhost:8000/api/");
        assert_eq!(provider.token_url, "http://localhost:8000/api/login");
    }
}
