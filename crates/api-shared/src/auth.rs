/// Reasons an API key check can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the key configured at startup.
///
/// No key configured means the gate is open and every request passes.
///
/// # Errors
///
/// Returns `AuthError::Missing` if a key is configured but none was provided, and
/// `AuthError::Invalid` if the provided key does not match.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: Option<&str>) -> Result<(), AuthError> {
    let Some(expected_key) = expected_key else {
        return Ok(());
    };

    match provided_key {
        None => Err(AuthError::Missing),
        Some(key) if key == expected_key => Ok(()),
        Some(_) => {
            tracing::warn!("rejected request with an invalid API key");
            Err(AuthError::Invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_configured_key_allows_everything() {
        assert_eq!(validate_api_key(None, None), Ok(()));
        assert_eq!(validate_api_key(Some("anything"), None), Ok(()));
    }

    #[test]
    fn test_configured_key_must_match() {
        assert_eq!(validate_api_key(Some("s3cret"), Some("s3cret")), Ok(()));
        assert_eq!(validate_api_key(None, Some("s3cret")), Err(AuthError::Missing));
        assert_eq!(
            validate_api_key(Some("guess"), Some("s3cret")),
            Err(AuthError::Invalid)
        );
    }
}
