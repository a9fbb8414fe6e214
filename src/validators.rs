/// Input validators for account and client registry data.
///
/// Length limits come first so oversized payloads are rejected before any
/// regex work. Fiscal-code and VAT checks follow the Italian formats used
/// throughout the client registry.

use crate::error::ValidationError;
use lazy_static::lazy_static;
use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_NAME_LENGTH: usize = 256;
const MIN_EMAIL_LENGTH: usize = 5;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // Italian codice fiscale: 6 letters, 2 digits, letter, 2 digits, letter, 3 digits, letter
    static ref FISCAL_CODE_REGEX: Regex =
        Regex::new(r"^[A-Za-z]{6}[0-9]{2}[A-Za-z][0-9]{2}[A-Za-z][0-9]{3}[A-Za-z]$").unwrap();

    // Italian partita IVA: exactly 11 digits
    static ref VAT_NUMBER_REGEX: Regex = Regex::new(r"^[0-9]{11}$").unwrap();
}

/// Validates an email address and returns the trimmed value.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) || trimmed.matches('@').count() != 1 {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates a display name (person or client) and returns the trimmed value.
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".to_string()));
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
    }

    // Control characters never belong in a name
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(
            "name contains control characters".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates an Italian fiscal code (codice fiscale) and returns it uppercased.
pub fn is_valid_fiscal_code(code: &str) -> Result<String, ValidationError> {
    let trimmed = code.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("fiscal code".to_string()));
    }

    if !FISCAL_CODE_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(format!(
            "{} is not a valid Italian fiscal code",
            trimmed
        )));
    }

    Ok(trimmed.to_uppercase())
}

/// Validates an Italian VAT number (partita IVA).
pub fn is_valid_vat_number(vat: &str) -> Result<String, ValidationError> {
    let trimmed = vat.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("VAT number".to_string()));
    }

    if !VAT_NUMBER_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(format!(
            "{} is not a valid Italian VAT number",
            trimmed
        )));
    }

    Ok(trimmed.to_string())
}
