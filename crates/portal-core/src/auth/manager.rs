use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, error, info, warn};

use super::credentials::{CredentialRecord, CredentialStore};
use super::error::AuthError;
use super::session::{SessionData, SessionSlot};
use super::token::{generate_id, generate_token};
use crate::models::{avatar_for_seed, Identity, IdentityUpdate, Role};
use crate::storage::{KeyValueStore, MemoryStorage};
use crate::utils::{is_valid_email, meets_password_policy, normalize_email};

/// Token lifetime in hours
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Minimum password length for registration
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Simulated round-trip bounds in milliseconds
pub const DEFAULT_LATENCY_MIN_MS: u64 = 500;
pub const DEFAULT_LATENCY_MAX_MS: u64 = 1500;

/// Uniformly distributed artificial delay applied before login and registration resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub min: StdDuration,
    pub max: StdDuration,
}

impl Latency {
    pub fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: StdDuration::from_millis(min),
            max: StdDuration::from_millis(max),
        }
    }

    pub fn sample(&self) -> StdDuration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        StdDuration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::from_millis(DEFAULT_LATENCY_MIN_MS, DEFAULT_LATENCY_MAX_MS)
    }
}

/// Tunables for the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub token_ttl: Duration,
    pub min_password_length: usize,
    /// `None` resolves login and registration immediately
    pub latency: Option<Latency>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            latency: Some(Latency::default()),
        }
    }
}

impl SessionSettings {
    /// Default policy without the artificial delay
    pub fn instant() -> Self {
        Self {
            latency: None,
            ..Self::default()
        }
    }
}

/// Authentication state machine and token lifecycle.
///
/// The manager is either anonymous (no valid session in the slot) or
/// authenticated. Expiry is detected lazily: every read of the slot drops a
/// session whose expiry has passed.
pub struct SessionManager {
    credentials: CredentialStore,
    slot: SessionSlot,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        storage: Arc<dyn KeyValueStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            credentials,
            slot: SessionSlot::new(storage),
            settings,
        }
    }

    /// Seeded credentials with process-local storage
    pub fn in_memory(settings: SessionSettings) -> Self {
        Self::new(
            CredentialStore::seeded(),
            Arc::new(MemoryStorage::new()),
            settings,
        )
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.settings.latency {
            let delay = latency.sample();
            debug!(delay_ms = delay.as_millis() as u64, "Simulating network delay");
            tokio::time::sleep(delay).await;
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Validate credentials and start a session
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.simulate_latency().await;

        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmailFormat);
        }

        let identity = match self.credentials.verify(email, password) {
            Some(identity) => identity,
            None => {
                debug!(email = %normalize_email(email), "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.issue_session(identity.clone())?;
        info!(email = %identity.email, role = %identity.role, "Login successful");
        Ok(identity)
    }

    /// Create a regular account and start a session for it
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.simulate_latency().await;

        let name = name.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmailFormat);
        }
        // Checked before the password policy: a taken email is reported as
        // taken no matter what password came with it.
        if self.credentials.contains(email) {
            return Err(AuthError::EmailExists);
        }
        let min_length = self.settings.min_password_length;
        if !meets_password_policy(password, min_length) {
            return Err(AuthError::WeakPassword { min_length });
        }

        let email = normalize_email(email);
        let identity = Identity {
            id: generate_id(),
            name: name.to_string(),
            avatar: Some(avatar_for_seed(&email)),
            email,
            role: Role::User,
            is_admin: false,
            created_at: Utc::now(),
        };

        if let Err(e) = self
            .credentials
            .insert(CredentialRecord::new(identity.clone(), password))
        {
            error!(error = %e, "Credential store rejected an email that passed the existence check");
            return Err(AuthError::EmailExists);
        }

        self.issue_session(identity.clone())?;
        info!(email = %identity.email, id = %identity.id, "Registration successful");
        Ok(identity)
    }

    fn issue_session(&self, identity: Identity) -> Result<SessionData, AuthError> {
        let data = SessionData::new(generate_token(), identity, self.settings.token_ttl);
        self.slot.save(&data)?;
        Ok(data)
    }

    /// Clear the persisted session, reporting storage failures
    pub fn try_logout(&self) -> Result<()> {
        self.slot.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Clear the persisted session. Never fails; calling it while anonymous is a no-op.
    pub fn logout(&self) {
        if let Err(e) = self.try_logout() {
            warn!(error = %e, "Logout could not clear session storage");
        }
    }

    // =========================================================================
    // Session state
    // =========================================================================

    /// The active session, if present and unexpired
    pub fn current_session(&self) -> Option<SessionData> {
        self.slot.load()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.current_session().map(|data| data.identity)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_identity().is_some()
    }

    /// Get the bearer token if the session is valid
    pub fn token(&self) -> Option<String> {
        self.current_session().map(|data| data.token)
    }

    pub fn token_expiration(&self) -> Option<DateTime<Utc>> {
        self.current_session().map(|data| data.expires_at)
    }

    /// True when there is no valid session to speak of
    pub fn is_token_expired(&self) -> bool {
        match self.token_expiration() {
            Some(expires_at) => expires_at <= Utc::now(),
            None => true,
        }
    }

    /// Reissue the token and push expiry out by a full lifetime.
    /// Returns false (touching nothing) when there is no active session.
    pub fn refresh(&self) -> bool {
        let Some(identity) = self.current_identity() else {
            return false;
        };

        match self.issue_session(identity) {
            Ok(data) => {
                debug!(expires_at = %data.expires_at, "Session refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist refreshed session");
                false
            }
        }
    }

    /// Merge profile changes into the session and the credential store.
    /// Returns `None` when nobody is signed in.
    pub fn update_identity(&self, update: IdentityUpdate) -> Option<Identity> {
        let mut session = self.current_session()?;
        if update.is_empty() {
            return Some(session.identity);
        }

        session.identity.apply(&update);
        if let Err(e) = self.slot.save(&session) {
            warn!(error = %e, "Failed to persist profile update");
            return None;
        }

        if self.credentials.update(&session.identity.email, &update).is_none() {
            debug!(email = %session.identity.email, "Signed-in identity has no credential record");
        }
        Some(session.identity)
    }
}
