//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted room key / account id. Generous: these are identifiers
/// minted by the hosting platform, not free text.
const MAX_IDENTIFIER_LEN: usize = 255;
/// Longest accepted display name.
const MAX_DISPLAY_NAME_LEN: usize = 80;

/// Validates an opaque identifier (account id, room key, issue id):
/// non-blank, bounded, free of control characters.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("identifier_blank");
        err.message = Some("identifier must not be blank".into());
        return Err(err);
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!("identifier must be at most {MAX_IDENTIFIER_LEN} characters").into(),
        );
        return Err(err);
    }

    if value.chars().any(char::is_control) {
        let mut err = ValidationError::new("identifier_control_chars");
        err.message = Some("identifier must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a participant display name: non-blank and bounded.
pub fn validate_display_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("display name must not be blank".into());
        return Err(err);
    }

    if value.chars().count() > MAX_DISPLAY_NAME_LEN {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("display name must be at most {MAX_DISPLAY_NAME_LEN} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_accept_typical_keys() {
        assert!(validate_identifier("GS").is_ok());
        assert!(validate_identifier("10042").is_ok());
        assert!(validate_identifier("5b10a2844c20165700ede21g").is_ok());
    }

    #[test]
    fn identifiers_reject_blank_and_control() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier("a\nb").is_err());
        assert!(validate_identifier(&"x".repeat(256)).is_err());
    }

    #[test]
    fn display_names_are_bounded() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"x".repeat(81)).is_err());
    }
}
