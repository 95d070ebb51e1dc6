use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, SessionData, SessionManager};
use crate::models::{Identity, IdentityUpdate};

/// How often a signed-in session is checked for expiry
pub const DEFAULT_EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Snapshot of the session as views see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub is_authenticated: bool,
    /// True until the first hydration and while login/registration is in flight
    pub is_loading: bool,
    /// Message from the last failed login or registration
    pub error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            identity: None,
            is_authenticated: false,
            is_loading: true,
            error: None,
        }
    }
}

struct Inner {
    manager: Arc<SessionManager>,
    state: watch::Sender<AuthState>,
    sweep: Mutex<Option<JoinHandle<()>>>,
    check_interval: Duration,
}

/// Session state provider shared by the view layer. Cloning is cheap and
/// every clone observes the same state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self::with_check_interval(manager, DEFAULT_EXPIRY_CHECK_INTERVAL)
    }

    /// Starts in the loading state; call `hydrate` to read the persisted session.
    pub fn with_check_interval(manager: Arc<SessionManager>, check_interval: Duration) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                manager,
                state,
                sweep: Mutex::new(None),
                check_interval,
            }),
        }
    }

    /// Load the persisted session once and leave the loading state
    pub fn hydrate(&self) {
        let identity = self.inner.manager.current_identity();
        debug!(authenticated = identity.is_some(), "Session context hydrated");
        self.inner.update(|state| {
            state.is_authenticated = identity.is_some();
            state.identity = identity;
            state.is_loading = false;
        });
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// The live session behind the current state, for expiry display
    pub fn session(&self) -> Option<SessionData> {
        self.inner.manager.current_session()
    }

    /// Whether the expiry check task is currently scheduled
    pub fn is_expiry_check_running(&self) -> bool {
        self.inner
            .sweep()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Sign in. Failures land in the error slot; `None` is returned instead of the error.
    pub async fn login(&self, email: &str, password: &str) -> Option<Identity> {
        self.inner.begin_request();
        let result = self.inner.manager.login(email, password).await;
        self.inner.finish_request(result, "Login")
    }

    /// Create an account and sign in to it. Failures land in the error slot.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Option<Identity> {
        self.inner.begin_request();
        let result = self.inner.manager.register(name, email, password).await;
        self.inner.finish_request(result, "Registration")
    }

    /// Sign out. Always leaves the context anonymous.
    pub fn logout(&self) {
        self.inner.logout();
    }

    pub fn clear_error(&self) {
        self.inner.update(|state| state.error = None);
    }

    /// Extend the current session; false when nobody is signed in
    pub fn refresh(&self) -> bool {
        let refreshed = self.inner.manager.refresh();
        if !refreshed && self.is_authenticated() && !self.inner.manager.is_authenticated() {
            // The manager found no live session behind our state
            self.inner.logout();
        }
        refreshed
    }

    /// Update the signed-in profile and republish it
    pub fn update_identity(&self, update: IdentityUpdate) -> Option<Identity> {
        let updated = self.inner.manager.update_identity(update)?;
        let identity = updated.clone();
        self.inner.update(|state| state.identity = Some(identity));
        Some(updated)
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Registered identities matching `query` by name or email, secrets stripped
    pub fn directory(&self, query: &str) -> Vec<Identity> {
        self.inner.manager.credentials().search(query)
    }

    /// Development utility: drop registered accounts and profile edits.
    /// The current session, if any, is left alone.
    pub fn reset_directory(&self) {
        self.inner.manager.credentials().reset();
    }
}

impl Inner {
    fn sweep(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweep.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a state change, then reconcile the expiry check with the new state
    fn update(self: &Arc<Self>, f: impl FnOnce(&mut AuthState)) {
        self.state.send_modify(|state| {
            f(state);
            if state.is_authenticated {
                state.error = None;
            }
        });
        self.sync_expiry_check();
    }

    fn begin_request(self: &Arc<Self>) {
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
        });
    }

    fn finish_request(
        self: &Arc<Self>,
        result: Result<Identity, AuthError>,
        action: &str,
    ) -> Option<Identity> {
        match result {
            Ok(identity) => {
                let published = identity.clone();
                self.update(|state| {
                    state.identity = Some(published);
                    state.is_authenticated = true;
                    state.is_loading = false;
                });
                Some(identity)
            }
            Err(e) => {
                if e.is_user_error() {
                    warn!(code = e.code(), "{} failed", action);
                } else {
                    error!(error = %e, "{} failed", action);
                }
                let message = e.to_string();
                self.update(|state| {
                    state.error = Some(message);
                    state.is_loading = false;
                });
                None
            }
        }
    }

    fn logout(self: &Arc<Self>) {
        if let Err(e) = self.manager.try_logout() {
            warn!(error = %e, "Logout failed, resetting session state anyway");
        }
        self.update(|state| {
            state.identity = None;
            state.is_authenticated = false;
            state.error = None;
        });
    }

    /// Run the expiry check while authenticated, stop it otherwise
    fn sync_expiry_check(self: &Arc<Self>) {
        let authenticated = self.state.borrow().is_authenticated;
        let mut sweep = self.sweep();

        if authenticated {
            let running = sweep
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false);
            if !running {
                *sweep = self.spawn_expiry_check();
            }
        } else if let Some(handle) = sweep.take() {
            handle.abort();
            debug!("Expiry check stopped");
        }
    }

    fn spawn_expiry_check(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, session expiry will only be detected on read");
                return None;
            }
        };

        // Weak so the task never keeps a dropped context alive
        let weak: Weak<Inner> = Arc::downgrade(self);
        let period = self.check_interval;
        debug!(period_secs = period.as_secs(), "Expiry check started");

        Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.manager.is_token_expired() {
                    info!("Session token expired, logging out");
                    inner.logout();
                    break;
                }
            }
        }))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = match self.sweep.get_mut() {
            Ok(sweep) => sweep.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
