use thiserror::Error;

/// Rejection reasons produced by the CRD evaluation pipeline.
///
/// Every variant maps to a request-level failure: the caller must stop
/// processing and report the error tag and message to the submitting
/// system. Advisory outcomes (missing patient, missing coverage) are not
/// errors and never appear here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing required field: hook")]
    MissingHook,

    #[error("The hook '{0}' is not supported by this CRD service.")]
    UnsupportedHook(String),

    #[error("The code '{0}' is not recognized.")]
    InvalidCode(String),

    #[error("Invalid PA flag format or ignored with default behavior")]
    InvalidPaFlag,

    #[error("No draft order resource could be located in the request.")]
    MissingDraftOrder,

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new UnsupportedHook error
    pub fn unsupported_hook(hook: impl Into<String>) -> Self {
        Self::UnsupportedHook(hook.into())
    }

    /// Create a new InvalidCode error
    pub fn invalid_code(code: impl Into<String>) -> Self {
        Self::InvalidCode(code.into())
    }

    /// Machine-readable error tag reported alongside the message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MissingHook => "invalid_request",
            Self::UnsupportedHook(_) => "CRD-004: Unsupported hook type",
            Self::InvalidCode(_) => "CRD-008: Invalid CPT/HCPCS/RxNorm code",
            Self::InvalidPaFlag => "Invalid or malformed PA requirement flag",
            Self::MissingDraftOrder => "CRD-010: Missing draft order resource",
            Self::JsonError(_) => "invalid_request",
        }
    }

    /// All rejections are caller mistakes; kept as a method so transport
    /// layers can classify uniformly if server-side variants appear.
    pub fn is_client_error(&self) -> bool {
        true
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CoreError::MissingHook.to_string(),
            "Missing required field: hook"
        );
        assert_eq!(
            CoreError::unsupported_hook("patient-view").to_string(),
            "The hook 'patient-view' is not supported by this CRD service."
        );
        assert_eq!(
            CoreError::invalid_code("ZZZZZ").to_string(),
            "The code 'ZZZZZ' is not recognized."
        );
        assert_eq!(
            CoreError::InvalidPaFlag.to_string(),
            "Invalid PA flag format or ignored with default behavior"
        );
    }

    #[test]
    fn test_error_tags() {
        assert_eq!(CoreError::MissingHook.tag(), "invalid_request");
        assert_eq!(
            CoreError::unsupported_hook("x").tag(),
            "CRD-004: Unsupported hook type"
        );
        assert_eq!(
            CoreError::invalid_code("x").tag(),
            "CRD-008: Invalid CPT/HCPCS/RxNorm code"
        );
        assert_eq!(
            CoreError::InvalidPaFlag.tag(),
            "Invalid or malformed PA requirement flag"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::JsonError(_)));
        assert!(core_err.is_client_error());
    }
}
