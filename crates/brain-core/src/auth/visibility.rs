//! Foreground tracking and the periodic renewal timer.
//!
//! Hosts report foreground/background transitions with
//! [`VisibilityMonitor::set_foreground`]. The timer spawned by
//! [`VisibilityMonitor::spawn_renewal_timer`] checks the session on a fixed
//! period; since proactive renewal requires the foreground flag, a
//! backgrounded client generates no renewal traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::SessionAuthority;

/// Default period of the renewal timer
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct VisibilityMonitor {
    authority: Arc<SessionAuthority>,
    foreground: AtomicBool,
}

impl VisibilityMonitor {
    /// Starts out in the foreground.
    pub fn new(authority: Arc<SessionAuthority>) -> Self {
        authority.set_tab_active(true);
        Self {
            authority,
            foreground: AtomicBool::new(true),
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    /// Record a visibility change.
    ///
    /// Coming back to the foreground gives an expired, remembered session a
    /// chance to renew. Reports whether the session is usable afterwards.
    pub async fn set_foreground(&self, foreground: bool) -> bool {
        let was_foreground = self.foreground.swap(foreground, Ordering::SeqCst);
        if was_foreground == foreground {
            return self.authority.is_authenticated();
        }

        debug!(foreground, "Visibility changed");
        self.authority.set_tab_active(foreground);

        if foreground {
            self.authority.on_foreground_resume().await
        } else {
            self.authority.is_authenticated()
        }
    }

    /// Feed visibility changes from a watch channel until its sender is dropped.
    pub async fn follow(self: Arc<Self>, mut visibility: watch::Receiver<bool>) {
        let initial = *visibility.borrow_and_update();
        self.set_foreground(initial).await;
        while visibility.changed().await.is_ok() {
            let foreground = *visibility.borrow_and_update();
            self.set_foreground(foreground).await;
        }
        debug!("Visibility source closed");
    }

    /// One timer tick: proactive check if there is a session at all.
    pub async fn tick(&self) -> bool {
        if !self.authority.has_token() {
            return false;
        }
        self.authority.ensure_fresh(false).await
    }

    /// Run `tick` every `period`, first one `period` from now.
    pub fn spawn_renewal_timer(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        info!(period_secs = period.as_secs(), "Starting session renewal timer");
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let valid = monitor.tick().await;
                debug!(valid, "Session check");
            }
        })
    }
}
