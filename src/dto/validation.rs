//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::race_machine::Flag;

/// Longest race identifier accepted from the operator.
pub const MAX_RACE_ID_LEN: usize = 64;

/// Validates that a flag name is one of the known flags (case-insensitive).
///
/// Legality against the current phase is checked later by the state machine;
/// this only rejects names that can never be valid.
pub fn validate_flag_name(name: &str) -> Result<(), ValidationError> {
    if name.parse::<Flag>().is_ok() {
        return Ok(());
    }

    let mut err = ValidationError::new("flag_name");
    err.message = Some(format!("Unknown flag `{name}`").into());
    Err(err)
}

/// Validates a race identifier: non-empty, bounded, URL-safe characters only.
pub fn validate_race_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_RACE_ID_LEN {
        let mut err = ValidationError::new("race_id_length");
        err.message = Some(
            format!(
                "Race ID must be 1 to {MAX_RACE_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        let mut err = ValidationError::new("race_id_format");
        err.message =
            Some("Race ID may only contain letters, digits, '-', '_' and '.'".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flag_name() {
        assert!(validate_flag_name("GREEN").is_ok());
        assert!(validate_flag_name("yellow").is_ok());
        assert!(validate_flag_name("purple").is_err());
        assert!(validate_flag_name("").is_err());
    }

    #[test]
    fn test_validate_race_id_valid() {
        assert!(validate_race_id("2026-spring_heat.3").is_ok());
        assert!(validate_race_id("42").is_ok());
    }

    #[test]
    fn test_validate_race_id_invalid() {
        assert!(validate_race_id("").is_err());
        assert!(validate_race_id(&"x".repeat(MAX_RACE_ID_LEN + 1)).is_err());
        assert!(validate_race_id("race 1").is_err()); // space
        assert!(validate_race_id("a/b").is_err()); // path separator
    }
}
