//! Authentication module for managing identities and sessions.
//!
//! This module provides:
//! - `CredentialStore`: in-memory registry of identities and their secrets
//! - `SessionManager`: login, registration and the token lifecycle
//! - `SessionSlot`: the single persisted session in key-value storage
//! - `AuthError`: user-facing failures of the above
//!
//! Sessions are persisted to key-value storage and tokens expire after 24 hours.
//! Secrets are kept in plain text and tokens come from a non-cryptographic
//! source; this is a mock backend for the portal demo.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod token;

pub use credentials::{demo_accounts, CredentialRecord, CredentialStore, DemoAccount};
pub use error::{AuthError, CredentialError};
pub use manager::{Latency, SessionManager, SessionSettings};
pub use session::{SessionData, SessionSlot};
