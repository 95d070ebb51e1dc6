use thiserror::Error;

/// Failures surfaced by login, registration and session persistence.
///
/// Every variant is recoverable. The display strings are written for end
/// users and are what the session context shows in its error slot.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Name, email, and password are required")]
    MissingFields,

    #[error("Please enter a valid email address")]
    InvalidEmailFormat,

    #[error("Password must be at least {min_length} characters long")]
    WeakPassword { min_length: usize },

    /// Unknown email and wrong password are deliberately the same error
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailExists,

    #[error("Failed to save session: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::MissingFields => "MISSING_FIELDS",
            AuthError::InvalidEmailFormat => "INVALID_EMAIL",
            AuthError::WeakPassword { .. } => "WEAK_PASSWORD",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailExists => "EMAIL_EXISTS",
            AuthError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True for errors caused by what the user typed, as opposed to storage trouble
    pub fn is_user_error(&self) -> bool {
        !matches!(self, AuthError::Storage(_))
    }
}

/// Credential store invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Duplicate email in credential store: {0}")]
    DuplicateEmail(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::MissingCredentials.code(), "MISSING_CREDENTIALS");
        assert_eq!(AuthError::InvalidEmailFormat.code(), "INVALID_EMAIL");
        assert_eq!(AuthError::WeakPassword { min_length: 6 }.code(), "WEAK_PASSWORD");
        assert_eq!(AuthError::EmailExists.code(), "EMAIL_EXISTS");
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AuthError::WeakPassword { min_length: 6 }.to_string(),
            "Password must be at least 6 characters long"
        );
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid email or password");

        let storage = AuthError::from(anyhow::anyhow!("disk full"));
        assert_eq!(storage.to_string(), "Failed to save session: disk full");
        assert!(!storage.is_user_error());
        assert!(AuthError::MissingFields.is_user_error());
    }
}
