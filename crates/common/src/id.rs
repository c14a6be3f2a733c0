//! Identifier parsing.
//!
//! Proposals, categories, attachments and principals are identified by
//! positive integers. Transport layers hand us strings; anything that is not
//! a positive integer is rejected before it reaches the store.

use crate::error::{AppError, AppResult};

/// Parse a positive integer identifier.
pub fn parse_id(raw: &str) -> AppResult<i32> {
    let trimmed = raw.trim();
    match trimmed.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(format!(
            "Invalid identifier: {trimmed:?}"
        ))),
    }
}

/// Check that an already-numeric identifier is positive.
pub fn ensure_id(id: i32) -> AppResult<i32> {
    if id > 0 {
        Ok(id)
    } else {
        Err(AppError::InvalidInput(format!("Invalid identifier: {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        assert_eq!(parse_id("42").ok(), Some(42));
        assert_eq!(parse_id(" 7 ").ok(), Some(7));
    }

    #[test]
    fn test_parse_rejects_non_integer() {
        for raw in ["", "abc", "4.2", "1e3", "0x10"] {
            assert!(
                matches!(parse_id(raw), Err(AppError::InvalidInput(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert!(matches!(parse_id("0"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_id("-3"), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_ensure_id() {
        assert_eq!(ensure_id(1).ok(), Some(1));
        assert!(ensure_id(0).is_err());
    }
}
