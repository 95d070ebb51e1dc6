//! Reactive session state for view components.
//!
//! `SessionContext` wraps a `SessionManager` and republishes its state as an
//! `AuthState` snapshot on a `tokio::sync::watch` channel. Views subscribe to
//! the channel and call the context's `login`, `register`, `logout` and
//! `clear_error`; they never reach the manager or the credential store
//! directly.
//!
//! While a user is signed in, a background task checks for token expiry on a
//! fixed interval and logs the user out when the token has lapsed.

pub mod provider;

pub use provider::{AuthState, SessionContext, DEFAULT_EXPIRY_CHECK_INTERVAL};
