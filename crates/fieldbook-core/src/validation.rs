//! Input validation that runs before any store access.

use crate::error::ValidationError;

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Trim and lowercase an email address so lookups and dedup agree.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Validate and normalize an email address.
///
/// This is a structural check, not deliverability:
/// - exactly one `@` with a non-empty local part
/// - a domain containing a dot, not starting or ending with one
/// - no whitespace or control characters
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = normalize_email(raw);

    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::InvalidEmail);
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidEmail);
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::InvalidEmail);
    }
    if domain.contains("..") {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(email)
}
