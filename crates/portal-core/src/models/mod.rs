//! Data models for portal identities.
//!
//! - `Identity`: a registered person's public profile (never carries a secret)
//! - `Role`: the coarse permission tag attached to every identity
//! - `IdentityUpdate`: partial profile update applied by the session manager

pub mod identity;

pub use identity::{avatar_for_seed, Identity, IdentityUpdate, Role};
