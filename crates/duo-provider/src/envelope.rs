//! Decoding of the Admin API `stat` envelope.

use crate::error::{ProviderError, Result};
use duo_api_client::ApiResponse;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Uniform response wrapper returned by every Admin API call.
#[derive(Debug, Clone, Deserialize)]
pub struct StatEnvelope {
    pub stat: String,
    pub code: Option<u32>,
    pub response: Option<Value>,
    pub message: Option<String>,
    pub message_detail: Option<String>,
}

impl StatEnvelope {
    /// Parse the raw body. A body that is not JSON is a decode error.
    pub fn from_response(response: &ApiResponse) -> Result<Self> {
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub fn is_ok(&self) -> bool {
        self.stat == "OK"
    }

    /// Return the payload, or an API error labelled with `context`.
    pub fn into_payload(self, status: u16, context: impl FnOnce() -> String) -> Result<Value> {
        if self.is_ok() {
            return Ok(self.response.unwrap_or(Value::Null));
        }

        Err(ProviderError::Api {
            context: context(),
            status,
            stat: self.stat,
            code: self.code,
            message: self.message.unwrap_or_else(|| "no message".into()),
            detail: self.message_detail,
        })
    }
}

/// Decode a successful payload into `T`.
pub fn parse<T: DeserializeOwned>(
    response: &ApiResponse,
    context: impl FnOnce() -> String,
) -> Result<T> {
    let payload = StatEnvelope::from_response(response)?.into_payload(response.status, context)?;
    Ok(serde_json::from_value(payload)?)
}

/// Check that a call succeeded, ignoring its payload.
pub fn check(response: &ApiResponse, context: impl FnOnce() -> String) -> Result<()> {
    StatEnvelope::from_response(response)?
        .into_payload(response.status, context)
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Item {
        name: String,
    }

    #[test]
    fn test_parse_ok_payload() {
        let response = ApiResponse::json(200, &json!({"stat": "OK", "response": {"name": "a"}}));
        let item: Item = parse(&response, || "ctx".into()).unwrap();
        assert_eq!(item.name, "a");
    }

    #[test]
    fn test_parse_fail_carries_stat_and_message() {
        let response = ApiResponse::json(
            400,
            &json!({
                "stat": "FAIL",
                "code": 40003,
                "message": "Duplicate resource",
                "message_detail": "username"
            }),
        );

        let err = parse::<Item>(&response, || "could not create user".into()).unwrap_err();
        match err {
            ProviderError::Api {
                context,
                status,
                stat,
                code,
                message,
                detail,
            } => {
                assert_eq!(context, "could not create user");
                assert_eq!(status, 400);
                assert_eq!(stat, "FAIL");
                assert_eq!(code, Some(40003));
                assert_eq!(message, "Duplicate resource");
                assert_eq!(detail.as_deref(), Some("username"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fail_without_code_on_404_is_not_found() {
        let response = ApiResponse::new(404, r#"{"stat": "FAIL", "message": "Not Found"}"#);
        let err = check(&response, || "could not read user DU1".into()).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err.or_not_found("user DU1"),
            ProviderError::NotFound(ref what) if what == "user DU1"
        ));
    }

    #[test]
    fn test_any_stat_other_than_ok_fails() {
        let response = ApiResponse::json(200, &json!({"stat": "ok", "response": {}}));
        assert!(matches!(
            check(&response, || "ctx".into()),
            Err(ProviderError::Api { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let response = ApiResponse::new(502, "<html>Bad Gateway</html>");
        assert!(matches!(
            check(&response, || "ctx".into()),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn test_payload_shape_mismatch_is_decode_error() {
        let response = ApiResponse::json(200, &json!({"stat": "OK", "response": "nope"}));
        assert!(matches!(
            parse::<Item>(&response, || "ctx".into()),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn test_check_ignores_payload() {
        let response = ApiResponse::json(200, &json!({"stat": "OK", "response": ""}));
        assert!(check(&response, || "ctx".into()).is_ok());
    }
}
