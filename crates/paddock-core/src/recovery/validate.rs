//! Local input checks for the recovery flow.
//!
//! These run before any network traffic. A failure here means the server
//! was never contacted.

use crate::api::ApiError;

/// Basic email shape: one `@`, a non-empty local part, a dotted domain,
/// no whitespace. The server does the real verification by delivering
/// the code.
pub fn email(candidate: &str) -> Result<(), ApiError> {
    let ok = match candidate.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !candidate.chars().any(char::is_whitespace)
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Please enter a valid email address".to_string(),
        ))
    }
}

/// Verification codes are exactly six ASCII digits
pub fn otp_code(code: &str) -> Result<(), ApiError> {
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "The verification code is 6 digits".to_string(),
        ))
    }
}

/// Minimum password strength: at least 8 characters with at least one
/// letter and one digit
pub fn new_password(password: &str) -> Result<(), ApiError> {
    let long_enough = password.chars().count() >= 8;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Password must be at least 8 characters and include a letter and a number".to_string(),
        ))
    }
}
