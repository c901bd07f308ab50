use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::identity::TokenEnvelope;

/// Current layout of the persisted session record.
pub const SESSION_RECORD_VERSION: u32 = 1;

/// Minimal descriptor of the logged-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
}

/// The single active session of this client.
///
/// An empty `access_token` means "no session". `tab_active` is runtime-only
/// and is never written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub identity: Option<Identity>,
    pub remember: bool,
    pub tab_active: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: None,
            identity: None,
            remember: false,
            tab_active: true,
        }
    }
}

impl Session {
    /// Build a fresh session from a password-grant envelope.
    pub fn from_envelope(envelope: &TokenEnvelope, identity: Option<Identity>, remember: bool) -> Self {
        Self {
            access_token: envelope.access_token.clone(),
            refresh_token: envelope.refresh_token.clone(),
            expires_at: Some(envelope.expires_at_from(Utc::now())),
            identity,
            remember,
            tab_active: true,
        }
    }

    /// Replace the token triple after a successful renewal.
    /// Identity and flags stay as they are.
    pub fn apply_renewal(&mut self, envelope: &TokenEnvelope) {
        self.access_token = envelope.access_token.clone();
        self.refresh_token = envelope.refresh_token.clone();
        self.expires_at = Some(envelope.expires_at_from(Utc::now()));
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Time left before the access token must not be trusted.
    /// Zero when there is no expiry at all.
    pub fn time_until_expiry(&self) -> Duration {
        match self.expires_at {
            Some(expires_at) => expires_at - Utc::now(),
            None => Duration::zero(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.time_until_expiry() <= Duration::zero()
    }

    pub fn is_authenticated(&self) -> bool {
        self.has_token() && !self.is_expired()
    }

    /// Check if the session will expire within `threshold`
    pub fn needs_refresh(&self, threshold: Duration) -> bool {
        self.time_until_expiry() < threshold
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    /// Drop every credential. The foreground flag belongs to the
    /// visibility monitor and survives.
    pub fn reset(&mut self) {
        let tab_active = self.tab_active;
        *self = Self {
            tab_active,
            ..Self::default()
        };
    }
}

/// On-disk shape of a session.
///
/// Written as one document so the token triple can never be half-updated.
/// Field names follow the keys the web console used in local storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry in milliseconds since the Unix epoch, as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Identity>,
    /// `"true"` or `"false"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_login: Option<String>,
}

impl SessionRecord {
    pub fn from_session(session: &Session) -> Self {
        Self {
            version: SESSION_RECORD_VERSION,
            auth_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
            token_expiry: session
                .expires_at
                .map(|expires_at| expires_at.timestamp_millis().to_string()),
            user_info: session.identity.clone(),
            auto_login: Some(session.remember.to_string()),
        }
    }

    /// Turn the record back into a session.
    ///
    /// Returns `None` unless the token triple is complete and well-formed;
    /// a partial record is the same as no record.
    pub fn into_session(self) -> Option<Session> {
        if self.version != SESSION_RECORD_VERSION {
            warn!(version = self.version, "Ignoring session record with unknown version");
            return None;
        }

        let access_token = self.auth_token.filter(|t| !t.is_empty());
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty());
        let expires_at = self.token_expiry.as_deref().and_then(parse_expiry_millis);

        let (Some(access_token), Some(refresh_token), Some(expires_at)) =
            (access_token, refresh_token, expires_at)
        else {
            debug!("Session record is incomplete, treating as logged out");
            return None;
        };

        Some(Session {
            access_token,
            refresh_token,
            expires_at: Some(expires_at),
            identity: self.user_info,
            remember: self.auto_login.as_deref() == Some("true"),
            tab_active: true,
        })
    }
}

fn parse_expiry_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
