//! Seams to the user-facing side of the client.
//!
//! The library never prints or navigates on its own. Hosts plug in a
//! [`Notifier`] for transient error notices and a [`Navigator`] that knows
//! how to send the user back to the login entry point.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

/// User-visible error channel. Takes one human-readable message at a time.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Where unauthenticated users are sent.
pub trait Navigator: Send + Sync {
    /// Whether the user is already at the login entry point
    fn at_login(&self) -> bool;

    fn to_login(&self);
}

/// Notices go to the log and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!(notice = message, "User notice");
    }
}

/// Tracks whether the host is showing its login entry point.
#[derive(Debug)]
pub struct LoginRoute {
    at_login: AtomicBool,
}

impl LoginRoute {
    pub fn new(at_login: bool) -> Self {
        Self {
            at_login: AtomicBool::new(at_login),
        }
    }

    /// Called by the host once a login succeeded and it moved on.
    pub fn leave_login(&self) {
        self.at_login.store(false, Ordering::SeqCst);
    }
}

impl Default for LoginRoute {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Navigator for LoginRoute {
    fn at_login(&self) -> bool {
        self.at_login.load(Ordering::SeqCst)
    }

    fn to_login(&self) {
        if !self.at_login.swap(true, Ordering::SeqCst) {
            info!("Redirecting to login");
        }
    }
}
