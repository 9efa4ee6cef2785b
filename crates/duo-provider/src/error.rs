//! Provider error types.

use duo_api_client::ClientError;
use thiserror::Error;

/// Errors returned by configuration and resource operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{context}: {stat} {message}")]
    Api {
        context: String,
        /// HTTP status of the response
        status: u16,
        stat: String,
        code: Option<u32>,
        message: String,
        detail: Option<String>,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid attributes for {resource}: {message}")]
    InvalidAttributes { resource: String, message: String },

    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),

    #[error("{0} does not support in-place update")]
    UpdateNotSupported(&'static str),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

impl ProviderError {
    pub fn invalid(resource: &str, message: impl Into<String>) -> Self {
        ProviderError::InvalidAttributes {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Whether the remote side reported the resource as absent.
    ///
    /// Admin API "not found" codes are 404xx. A FAIL envelope without a
    /// code counts when the HTTP status is 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            ProviderError::NotFound(_) => true,
            ProviderError::Api {
                code: Some(code), ..
            } => code / 100 == 404,
            ProviderError::Api {
                code: None, status, ..
            } => *status == 404,
            _ => false,
        }
    }

    /// Turn a remote not-found failure into [`ProviderError::NotFound`].
    pub fn or_not_found(self, what: impl Into<String>) -> Self {
        if self.is_not_found() {
            ProviderError::NotFound(what.into())
        } else {
            self
        }
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Configuration(_) => "configuration",
            ProviderError::Api { .. } => "api",
            ProviderError::Decode(_) => "decode",
            ProviderError::NotFound(_) => "not_found",
            ProviderError::InvalidAttributes { .. } => "invalid_attributes",
            ProviderError::UnsupportedResource(_) => "unsupported_resource",
            ProviderError::UpdateNotSupported(_) => "update_not_supported",
            ProviderError::Client(_) => "client",
        }
    }
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: Option<u32>) -> ProviderError {
        api_error_with_status(400, code)
    }

    fn api_error_with_status(status: u16, code: Option<u32>) -> ProviderError {
        ProviderError::Api {
            context: "could not find user DU1".into(),
            status,
            stat: "FAIL".into(),
            code,
            message: "Resource not found".into(),
            detail: None,
        }
    }

    #[test]
    fn test_api_error_display_surfaces_message() {
        let err = api_error(Some(40401));
        assert_eq!(
            err.to_string(),
            "could not find user DU1: FAIL Resource not found"
        );
    }

    #[test]
    fn test_not_found_codes() {
        assert!(api_error(Some(40401)).is_not_found());
        assert!(api_error(Some(40403)).is_not_found());
        assert!(!api_error(Some(40003)).is_not_found());
        assert!(!api_error(None).is_not_found());
        assert!(ProviderError::NotFound("x".into()).is_not_found());
    }

    #[test]
    fn test_http_404_without_code_is_not_found() {
        assert!(api_error_with_status(404, None).is_not_found());
        assert!(!api_error_with_status(500, None).is_not_found());
        // An explicit code decides over the HTTP status.
        assert!(!api_error_with_status(404, Some(40003)).is_not_found());
    }

    #[test]
    fn test_or_not_found_converts_only_not_found() {
        let converted = api_error(Some(40401)).or_not_found("user DU1");
        assert!(matches!(converted, ProviderError::NotFound(ref what) if what == "user DU1"));

        let kept = api_error(Some(40003)).or_not_found("user DU1");
        assert!(matches!(kept, ProviderError::Api { .. }));
    }

    #[test]
    fn test_kind() {
        assert_eq!(ProviderError::Configuration("x".into()).kind(), "configuration");
        assert_eq!(api_error(None).kind(), "api");
        assert_eq!(ProviderError::invalid("duo_user", "bad").kind(), "invalid_attributes");
    }
}
