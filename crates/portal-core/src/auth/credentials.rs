use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{TimeZone, Utc};
use tracing::debug;

use super::error::CredentialError;
use crate::models::{avatar_for_seed, Identity, IdentityUpdate, Role};
use crate::utils::{cmp_ignore_case, contains_ignore_case, normalize_email};

/// An identity together with its secret. Never leaves the store whole.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub identity: Identity,
    password: String,
}

impl CredentialRecord {
    pub fn new(identity: Identity, password: impl Into<String>) -> Self {
        Self {
            identity,
            password: password.into(),
        }
    }

    pub fn matches_password(&self, password: &str) -> bool {
        self.password == password
    }
}

/// A seeded demo login, as shown on the sign-in screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoAccount {
    pub label: &'static str,
    pub email: &'static str,
    pub password: &'static str,
}

static DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        label: "admin",
        email: "admin@example.com",
        password: "admin123",
    },
    DemoAccount {
        label: "user",
        email: "user@example.com",
        password: "user123",
    },
    DemoAccount {
        label: "johnDoe",
        email: "john.doe@example.com",
        password: "password123",
    },
];

/// Email/password pairs for the seeded accounts
pub fn demo_accounts() -> &'static [DemoAccount] {
    &DEMO_ACCOUNTS
}

fn seed_records() -> Vec<CredentialRecord> {
    let seed = |id: &str,
                name: &str,
                account: &DemoAccount,
                role: Role,
                avatar_seed: &str,
                (y, m, d): (i32, u32, u32)| {
        CredentialRecord::new(
            Identity {
                id: id.to_string(),
                name: name.to_string(),
                email: account.email.to_string(),
                role,
                is_admin: role == Role::Admin,
                avatar: Some(avatar_for_seed(avatar_seed)),
                created_at: Utc
                    .with_ymd_and_hms(y, m, d, 0, 0, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            },
            account.password,
        )
    };

    vec![
        seed("1", "Admin User", &DEMO_ACCOUNTS[0], Role::Admin, "admin", (2024, 1, 1)),
        seed("2", "Regular User", &DEMO_ACCOUNTS[1], Role::User, "user", (2024, 1, 15)),
        seed("3", "John Doe", &DEMO_ACCOUNTS[2], Role::User, "john", (2024, 2, 1)),
    ]
}

/// In-memory registry of identities and their secrets, keyed by lower-cased email.
pub struct CredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl CredentialStore {
    /// Store holding only the demo accounts
    pub fn seeded() -> Self {
        let store = Self::empty();
        store.reset();
        store
    }

    pub fn empty() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, CredentialRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Case-insensitive exact lookup
    pub fn find_by_email(&self, email: &str) -> Option<CredentialRecord> {
        self.records().get(&normalize_email(email)).cloned()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.records().contains_key(&normalize_email(email))
    }

    /// Look up and check the secret in one step. Unknown email and wrong
    /// secret both yield `None`.
    pub fn verify(&self, email: &str, password: &str) -> Option<Identity> {
        self.records()
            .get(&normalize_email(email))
            .filter(|record| record.matches_password(password))
            .map(|record| record.identity.clone())
    }

    pub fn insert(&self, record: CredentialRecord) -> Result<(), CredentialError> {
        let key = normalize_email(&record.identity.email);
        let mut records = self.records();
        if records.contains_key(&key) {
            return Err(CredentialError::DuplicateEmail(key));
        }
        debug!(email = %key, "Credential record inserted");
        records.insert(key, record);
        Ok(())
    }

    /// Merge a partial update into the record for `email`. Returns the
    /// updated identity, or `None` if no such record exists.
    pub fn update(&self, email: &str, update: &IdentityUpdate) -> Option<Identity> {
        let mut records = self.records();
        let record = records.get_mut(&normalize_email(email))?;
        record.identity.apply(update);
        Some(record.identity.clone())
    }

    /// All identities, secrets stripped, oldest first
    pub fn list_all(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self
            .records()
            .values()
            .map(|record| record.identity.clone())
            .collect();
        identities.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.email.cmp(&b.email))
        });
        identities
    }

    /// Identities whose name or email contains `query`, sorted by name
    pub fn search(&self, query: &str) -> Vec<Identity> {
        let query = query.trim();
        let mut matches: Vec<Identity> = self
            .list_all()
            .into_iter()
            .filter(|identity| {
                contains_ignore_case(&identity.name, query)
                    || contains_ignore_case(&identity.email, query)
            })
            .collect();
        matches.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name));
        matches
    }

    /// Restore the seed set, discarding registered identities and profile edits
    pub fn reset(&self) {
        let mut records = self.records();
        records.clear();
        for record in seed_records() {
            records.insert(normalize_email(&record.identity.email), record);
        }
        debug!(count = records.len(), "Credential store reset to seed accounts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> CredentialRecord {
        CredentialRecord::new(
            Identity {
                id: "abc1234".to_string(),
                name: "Jane Doe".to_string(),
                email: "jane@x.com".to_string(),
                role: Role::User,
                is_admin: false,
                avatar: None,
                created_at: Utc::now(),
            },
            "longenough1",
        )
    }

    #[test]
    fn test_seeded_accounts() {
        let store = CredentialStore::seeded();
        assert_eq!(store.list_all().len(), 3);

        let admin = store.find_by_email("admin@example.com").expect("admin seeded");
        assert_eq!(admin.identity.role, Role::Admin);
        assert!(admin.identity.is_admin);
        assert!(admin.matches_password("admin123"));

        let user = store.find_by_email("user@example.com").expect("user seeded");
        assert!(!user.identity.is_admin);
        assert_eq!(user.identity.role, Role::User);
    }

    #[test]
    fn test_demo_accounts_all_verify() {
        let store = CredentialStore::seeded();
        for account in demo_accounts() {
            let identity = store
                .verify(account.email, account.password)
                .unwrap_or_else(|| panic!("{} should verify", account.label));
            assert_eq!(identity.email, account.email);
        }
    }

    #[test]
    fn test_find_by_email_case_insensitive() {
        let store = CredentialStore::seeded();
        assert!(store.find_by_email("ADMIN@Example.com").is_some());
        assert!(store.find_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn test_verify_does_not_distinguish_failures() {
        let store = CredentialStore::seeded();
        assert!(store.verify("admin@example.com", "wrongpass").is_none());
        assert!(store.verify("ghost@example.com", "admin123").is_none());
    }

    #[test]
    fn test_insert_rejects_duplicate_email() {
        let store = CredentialStore::seeded();
        store.insert(jane()).unwrap();
        assert_eq!(store.list_all().len(), 4);

        let mut again = jane();
        again.identity.email = "JANE@X.COM".to_string();
        assert_eq!(
            store.insert(again),
            Err(CredentialError::DuplicateEmail("jane@x.com".to_string()))
        );
        assert_eq!(store.list_all().len(), 4);
    }

    #[test]
    fn test_list_all_strips_secrets_and_is_ordered() {
        let store = CredentialStore::seeded();
        let emails: Vec<String> = store.list_all().into_iter().map(|i| i.email).collect();
        assert_eq!(
            emails,
            vec!["admin@example.com", "user@example.com", "john.doe@example.com"]
        );
    }

    #[test]
    fn test_update_merges_fields() {
        let store = CredentialStore::seeded();
        let updated = store
            .update("user@example.com", &IdentityUpdate::name("Renamed User"))
            .expect("record exists");
        assert_eq!(updated.name, "Renamed User");
        assert_eq!(
            store.find_by_email("user@example.com").unwrap().identity.name,
            "Renamed User"
        );
        assert!(store.update("ghost@example.com", &IdentityUpdate::name("x")).is_none());
    }

    #[test]
    fn test_search() {
        let store = CredentialStore::seeded();
        let names: Vec<String> = store.search("user").into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Admin User", "Regular User"]);

        assert_eq!(store.search("JOHN.doe").len(), 1);
        assert_eq!(store.search("").len(), 3);
        assert!(store.search("nobody").is_empty());
    }

    #[test]
    fn test_reset_discards_registered_and_edits() {
        let store = CredentialStore::seeded();
        store.insert(jane()).unwrap();
        store.update("admin@example.com", &IdentityUpdate::name("Boss"));

        store.reset();
        assert_eq!(store.list_all().len(), 3);
        assert!(!store.contains("jane@x.com"));
        assert_eq!(
            store.find_by_email("admin@example.com").unwrap().identity.name,
            "Admin User"
        );
    }
}
