//! Session core for the intranet portal.
//!
//! The portal's views render mock data; the only stateful piece is the mock
//! authentication flow implemented here:
//!
//! - [`auth`]: credential store, session manager and token lifecycle
//! - [`context`]: reactive session state for view components
//! - [`storage`]: durable key-value storage the session is persisted to
//! - [`config`]: user configuration
//!
//! Services are plain values built once at startup and shared by reference:
//!
//! ```no_run
//! use std::sync::Arc;
//! use portal_core::{CredentialStore, FileStorage, SessionContext, SessionManager, SessionSettings};
//!
//! # async fn run() {
//! let storage = Arc::new(FileStorage::new("/tmp/intranet-portal"));
//! let manager = Arc::new(SessionManager::new(
//!     CredentialStore::seeded(),
//!     storage,
//!     SessionSettings::default(),
//! ));
//! let context = SessionContext::new(manager);
//! context.hydrate();
//! context.login("admin@example.com", "admin123").await;
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod models;
pub mod storage;
pub mod utils;

pub use auth::{AuthError, CredentialStore, SessionData, SessionManager, SessionSettings};
pub use config::Config;
pub use context::{AuthState, SessionContext};
pub use models::{Identity, IdentityUpdate, Role};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
