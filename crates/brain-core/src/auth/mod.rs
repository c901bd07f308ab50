//! Authentication module for managing the operator session.
//!
//! This module provides:
//! - `Session`: access/refresh tokens, expiry, identity and flags
//! - `TokenStore`: the in-memory session plus its persisted record
//! - `SessionStorage` backends: JSON file, OS keychain, memory
//! - `IdentityProvider`: the `/login` grant endpoint
//! - `SessionAuthority`: login, renewal and logout
//! - `VisibilityMonitor`: foreground tracking and periodic renewal
//!
//! Access tokens are short-lived (30 minutes on the stock backend) and are
//! renewed 5 minutes before expiry while the client is in the foreground.

pub mod authority;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod session;
pub mod store;
pub mod visibility;

pub use authority::{SessionAuthority, RENEWAL_THRESHOLD_MINUTES};
pub use credentials::KeyringStorage;
pub use error::AuthError;
pub use identity::{HttpIdentityProvider, IdentityProvider, LoginCredentials, TokenEnvelope};
pub use session::{Identity, Session, SessionRecord};
pub use store::{FileStorage, MemoryStorage, SessionStorage, TokenStore};
pub use visibility::VisibilityMonitor;
