use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::Identity;
use crate::storage::KeyValueStore;

/// Storage key for the opaque session token
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key for the serialized identity snapshot
pub const IDENTITY_KEY: &str = "auth_user";

/// Storage key for the RFC 3339 expiry timestamp
pub const EXPIRES_AT_KEY: &str = "auth_expires_at";

/// Buffer time before expiry to suggest a refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// One issued session: the token, who it belongs to, and when it stops working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: String, identity: Identity, ttl: Duration) -> Self {
        Self {
            token,
            identity,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Expired once the expiry instant has been reached
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() >= refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// The single session slot in durable storage.
///
/// Three entries make up a session. A read only succeeds when all three are
/// present, parse, and the expiry lies in the future; any other read clears
/// all three together.
#[derive(Clone)]
pub struct SessionSlot {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionSlot {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Load the active session, clearing the slot if it is incomplete, unreadable or expired
    pub fn load(&self) -> Option<SessionData> {
        match self.read() {
            Ok(Some(data)) if !data.is_expired() => Some(data),
            Ok(Some(data)) => {
                debug!(expired_at = %data.expires_at, "Session expired");
                self.clear_quietly();
                None
            }
            Ok(None) => {
                self.clear_quietly();
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session");
                self.clear_quietly();
                None
            }
        }
    }

    /// Persist a session, replacing whatever occupied the slot
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let identity = serde_json::to_string(&data.identity)
            .context("Failed to serialize session identity")?;
        self.storage.set(TOKEN_KEY, &data.token)?;
        self.storage.set(IDENTITY_KEY, &identity)?;
        self.storage.set(EXPIRES_AT_KEY, &data.expires_at.to_rfc3339())?;
        debug!(email = %data.identity.email, expires_at = %data.expires_at, "Session saved");
        Ok(())
    }

    /// Remove all three entries. Attempts every key even if one fails.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in [TOKEN_KEY, IDENTITY_KEY, EXPIRES_AT_KEY] {
            if let Err(e) = self.storage.remove(key) {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.context("Failed to clear session")),
            None => Ok(()),
        }
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear session storage");
        }
    }

    /// Raw read without expiry handling. `Ok(None)` means at least one entry is missing.
    fn read(&self) -> Result<Option<SessionData>> {
        let token = self.storage.get(TOKEN_KEY)?;
        let identity = self.storage.get(IDENTITY_KEY)?;
        let expires_at = self.storage.get(EXPIRES_AT_KEY)?;

        let (Some(token), Some(identity), Some(expires_at)) = (token, identity, expires_at) else {
            return Ok(None);
        };
        if token.is_empty() {
            return Ok(None);
        }

        let identity: Identity =
            serde_json::from_str(&identity).context("Failed to parse session identity")?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .context("Failed to parse session expiry")?
            .with_timezone(&Utc);

        Ok(Some(SessionData {
            token,
            identity,
            expires_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::storage::MemoryStorage;

    fn identity() -> Identity {
        Identity {
            id: "2".to_string(),
            name: "Regular User".to_string(),
            email: "user@example.com".to_string(),
            role: Role::User,
            is_admin: false,
            avatar: None,
            created_at: Utc::now(),
        }
    }

    fn slot() -> (Arc<MemoryStorage>, SessionSlot) {
        let storage = Arc::new(MemoryStorage::new());
        let slot = SessionSlot::new(storage.clone());
        (storage, slot)
    }

    // -------------------------------------------------------------------------
    // SessionData Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_expiry_helpers() {
        let fresh = SessionData::new("t".to_string(), identity(), Duration::hours(24));
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());
        assert!(fresh.minutes_until_expiry() >= 24 * 60 - 1);

        let mut closing = fresh.clone();
        closing.expires_at = Utc::now() + Duration::minutes(3);
        assert!(!closing.is_expired());
        assert!(closing.needs_refresh());

        let mut old = fresh;
        old.expires_at = Utc::now() - Duration::minutes(1);
        assert!(old.is_expired());
        assert_eq!(old.minutes_until_expiry(), 0);
    }

    // -------------------------------------------------------------------------
    // SessionSlot Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_save_then_load() {
        let (storage, slot) = slot();
        let data = SessionData::new("token-1".to_string(), identity(), Duration::hours(24));
        slot.save(&data).unwrap();

        assert_eq!(storage.len(), 3);
        // Sub-second precision survives the RFC 3339 round trip
        assert_eq!(slot.load(), Some(data));
    }

    #[test]
    fn test_identity_stored_as_camel_case_json() {
        let (storage, slot) = slot();
        slot.save(&SessionData::new("t".to_string(), identity(), Duration::hours(1)))
            .unwrap();
        let raw = storage.get(IDENTITY_KEY).unwrap().unwrap();
        assert!(raw.contains("\"isAdmin\":false"));
        assert!(raw.contains("\"createdAt\""));
    }

    #[test]
    fn test_expired_session_is_cleared_on_read() {
        let (storage, slot) = slot();
        let mut data = SessionData::new("t".to_string(), identity(), Duration::hours(1));
        data.expires_at = Utc::now() - Duration::seconds(1);
        slot.save(&data).unwrap();

        assert_eq!(slot.load(), None);
        assert!(storage.is_empty());
        // Reading twice is harmless
        assert_eq!(slot.load(), None);
    }

    #[test]
    fn test_partial_session_is_cleared() {
        let (storage, slot) = slot();
        storage.set(TOKEN_KEY, "orphan").unwrap();
        storage.set(EXPIRES_AT_KEY, "2999-01-01T00:00:00Z").unwrap();

        assert_eq!(slot.load(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_corrupt_session_is_cleared() {
        let (storage, slot) = slot();
        storage.set(TOKEN_KEY, "t").unwrap();
        storage.set(IDENTITY_KEY, "{not json").unwrap();
        storage.set(EXPIRES_AT_KEY, "2999-01-01T00:00:00Z").unwrap();

        assert_eq!(slot.load(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_unparseable_expiry_is_cleared() {
        let (storage, slot) = slot();
        let data = SessionData::new("t".to_string(), identity(), Duration::hours(1));
        slot.save(&data).unwrap();
        storage.set(EXPIRES_AT_KEY, "tomorrow").unwrap();

        assert_eq!(slot.load(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (storage, slot) = slot();
        slot.clear().unwrap();
        slot.save(&SessionData::new("t".to_string(), identity(), Duration::hours(1)))
            .unwrap();
        slot.clear().unwrap();
        slot.clear().unwrap();
        assert!(storage.is_empty());
    }
}
