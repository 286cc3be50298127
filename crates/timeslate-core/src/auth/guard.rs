use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::service::SessionService;
use crate::auth::session::Session;

/// How often an active guard re-checks session freshness.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3_600);

/// Gate decision for the protected view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No active session: send the user to the login view.
    Unauthenticated,
    /// Active session: render the protected tree.
    Authenticated,
}

/// Gates a protected view tree and drives the periodic freshness loop.
///
/// Each guard owns exactly one background task. While the session is
/// authenticated the task checks token freshness immediately and then on
/// every interval tick, renewing through the session service when the token
/// is expiring soon and forcing a logout when renewal fails. When the
/// authenticated flag flips, the interval is dropped; when the guard is
/// cancelled or dropped, the task is aborted. Must be created inside a
/// tokio runtime.
pub struct SessionGuard {
    service: Arc<SessionService>,
    handle: Option<JoinHandle<()>>,
}

impl SessionGuard {
    /// Mount a guard with the default check interval.
    pub fn mount(service: Arc<SessionService>) -> Self {
        Self::with_interval(service, DEFAULT_CHECK_INTERVAL)
    }

    /// Mount a guard with an explicit check interval.
    pub fn with_interval(service: Arc<SessionService>, period: Duration) -> Self {
        let handle = tokio::spawn(Self::run(Arc::clone(&service), period));
        Self {
            service,
            handle: Some(handle),
        }
    }

    /// Current gate decision for the protected tree.
    pub fn state(&self) -> GuardState {
        if self.service.current().authenticated {
            GuardState::Authenticated
        } else {
            GuardState::Unauthenticated
        }
    }

    /// Observe session changes; a flip to `authenticated == false` means
    /// "redirect to login".
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.service.subscribe()
    }

    /// Stop the freshness loop. Idempotent: safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    async fn run(service: Arc<SessionService>, period: Duration) {
        let mut sessions = service.subscribe();
        loop {
            // Wait for an authenticated session.
            if !sessions.borrow_and_update().authenticated {
                if sessions.changed().await.is_err() {
                    return;
                }
                continue;
            }

            debug!("session guard active");
            // The interval's first tick fires immediately, so the freshness
            // check runs on entry and then once per period.
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if service.check_token_expiration() {
                            debug!("session token expiring soon; attempting renewal");
                            if !service.refresh_token_if_needed().await {
                                warn!("session renewal failed; logging out");
                                service.logout();
                            }
                        }
                    }
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !sessions.borrow_and_update().authenticated {
                            break;
                        }
                    }
                }
            }
            // The interval is dropped here: one cancellation per
            // authenticated stretch, and never a second live timer.
            debug!("session guard idle");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
