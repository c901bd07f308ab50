use std::sync::atomic::{AtomicBool, Ordering};

use brain_core::hooks::{Navigator, Notifier};

/// Notices go straight to stderr.
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

/// The CLI has no login screen; "going to login" means telling the user
/// to run `brainctl login`, once.
#[derive(Default)]
pub struct LoginHint {
    shown: AtomicBool,
}

impl Navigator for LoginHint {
    fn at_login(&self) -> bool {
        self.shown.load(Ordering::SeqCst)
    }

    fn to_login(&self) {
        if !self.shown.swap(true, Ordering::SeqCst) {
            eprintln!("Run `brainctl login` to sign in again.");
        }
    }
}
