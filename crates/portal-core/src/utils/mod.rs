//! Utility functions for input validation and string comparison.

pub mod format;
pub mod validate;

// Re-export commonly used functions at module level
pub use format::{cmp_ignore_case, contains_ignore_case, truncate_string};
pub use validate::{is_valid_email, meets_password_policy, normalize_email};
