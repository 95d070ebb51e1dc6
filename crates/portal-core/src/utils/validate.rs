use once_cell::sync::Lazy;
use regex::Regex;

/// Something, an at-sign, something, a dot, something. No whitespace anywhere.
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Basic syntactic email check (`local@domain.tld`)
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Password length policy. Counts characters, not bytes.
pub fn meets_password_policy(password: &str, min_length: usize) -> bool {
    password.chars().count() >= min_length
}

/// Canonical form of an email used as the credential lookup key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        // Valid
        assert!(is_valid_email("admin@example.com"));
        assert!(is_valid_email("john.doe@example.co.uk"));
        assert!(is_valid_email("jane@x.com"));

        // Invalid
        assert!(!is_valid_email("")); // empty
        assert!(!is_valid_email("not-an-email")); // no at-sign
        assert!(!is_valid_email("user@localhost")); // no tld
        assert!(!is_valid_email("a b@example.com")); // whitespace
        assert!(!is_valid_email("a@@example.com")); // double at-sign
        assert!(!is_valid_email("@example.com")); // no local part
    }

    #[test]
    fn test_meets_password_policy() {
        assert!(meets_password_policy("123456", 6));
        assert!(meets_password_policy("longenough1", 6));
        assert!(!meets_password_policy("short", 6));
        // Multi-byte characters count once
        assert!(!meets_password_policy("ééééé", 6));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Admin@Example.COM "), "admin@example.com");
    }
}
