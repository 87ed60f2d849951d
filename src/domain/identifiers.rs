//! Validation of SQL identifiers that come from registries rather than code.
//!
//! Extension table and custom field names are only known at runtime, so they
//! are checked here before any query text is composed from them.

use crate::domain::error::DomainError;

const MAX_IDENTIFIER_LEN: usize = 63;

pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

pub fn validate_identifier(name: &str) -> Result<&str, DomainError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(DomainError::invalid_identifier(name))
    }
}

/// Double-quote an identifier that has already passed validation.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
