//! Input Validation
//!
//! Syntactic checks for account fields. Everything here is pure: no I/O,
//! no hashing, no database access. Callers run these before touching the
//! store so that malformed input is rejected as early as possible.

use crate::password;

use regex::Regex;

lazy_static::lazy_static! {
    static ref LOGIN_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_]{3,20}$").expect("valid login regex");
    static ref DISPLAY_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z]{2,20}$").expect("valid display name regex");
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex");
}

/// Field-specific validation failures
///
/// The display strings are returned to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Login must be 3-20 characters (letters, numbers, underscore)")]
    Login,

    #[error("Display name must contain only Latin letters (2-20 characters)")]
    DisplayName,

    #[error("Invalid email format")]
    Email,

    #[error("Password must be at least {} characters", password::MIN_PASSWORD_LENGTH)]
    Password,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

pub fn validate_login(login: &str) -> Result<(), ValidationError> {
    if LOGIN_RE.is_match(login) {
        Ok(())
    } else {
        Err(ValidationError::Login)
    }
}

/// Checks the raw display name, before normalization
pub fn validate_display_name(display_name: &str) -> Result<(), ValidationError> {
    if DISPLAY_NAME_RE.is_match(display_name) {
        Ok(())
    } else {
        Err(ValidationError::DisplayName)
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::Email)
    }
}

pub fn validate_password(plaintext: &str) -> Result<(), ValidationError> {
    if password::meets_policy(plaintext) {
        Ok(())
    } else {
        Err(ValidationError::Password)
    }
}

/// Normalize a display name: first letter uppercase, the rest lowercase.
///
/// Two names that differ only in case normalize to the same value, which is
/// what the uniqueness constraint is enforced on.
pub fn normalize_display_name(display_name: &str) -> String {
    let mut chars = display_name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_rules() {
        assert!(validate_login("alice1").is_ok());
        assert!(validate_login("a_b").is_ok());
        assert!(validate_login(&"x".repeat(20)).is_ok());

        assert_eq!(validate_login("ab"), Err(ValidationError::Login));
        assert_eq!(validate_login(&"x".repeat(21)), Err(ValidationError::Login));
        assert_eq!(validate_login("alice-1"), Err(ValidationError::Login));
        assert_eq!(validate_login("alice 1"), Err(ValidationError::Login));
        assert_eq!(validate_login(""), Err(ValidationError::Login));
    }

    #[test]
    fn test_display_name_rules() {
        assert!(validate_display_name("smith").is_ok());
        assert!(validate_display_name("Jo").is_ok());

        assert_eq!(validate_display_name("J"), Err(ValidationError::DisplayName));
        assert_eq!(validate_display_name("Smith2"), Err(ValidationError::DisplayName));
        assert_eq!(validate_display_name("Müller"), Err(ValidationError::DisplayName));
        assert_eq!(
            validate_display_name(&"a".repeat(21)),
            Err(ValidationError::DisplayName)
        );
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());

        assert_eq!(validate_email("a@example"), Err(ValidationError::Email));
        assert_eq!(validate_email("example.com"), Err(ValidationError::Email));
        assert_eq!(validate_email("a@@example.com"), Err(ValidationError::Email));
        assert_eq!(validate_email("a@example.c"), Err(ValidationError::Email));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("secret").is_ok());
        assert_eq!(validate_password("short"), Err(ValidationError::Password));
    }

    #[test]
    fn test_normalize_display_name() {
        assert_eq!(normalize_display_name("smith"), "Smith");
        assert_eq!(normalize_display_name("SMITH"), "Smith");
        assert_eq!(normalize_display_name("sMiTh"), "Smith");
        assert_eq!(normalize_display_name(""), "");
        assert_eq!(
            normalize_display_name("alice"),
            normalize_display_name("ALICE")
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::Password.to_string(),
            "Password must be at least 6 characters"
        );
        assert_eq!(
            ValidationError::PasswordMismatch.to_string(),
            "Passwords do not match"
        );
    }
}
