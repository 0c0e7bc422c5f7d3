//! # Validation Utilities
//!
//! Input validation helpers.

/// Validate that a string is not empty.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field_name))
    } else {
        Ok(())
    }
}

/// Validate email format (basic check).
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("Invalid email format".to_string()),
    }
}

/// Validate phone number format: optional leading `+`, then 6 to 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), String> {
    let digits = phone.trim().strip_prefix('+').unwrap_or(phone.trim());
    if (6..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("Invalid phone number format".to_string())
    }
}
