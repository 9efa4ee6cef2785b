//! Common test utilities for integration tests.

use duo_api_client::{ClientOptions, DuoApiClient, SignedCaller};
use duo_provider::config::DuoEnv;
use duo_provider::Provider;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub const TEST_IKEY: &str = "DIWJ8X6AEYOR5OMC6TQ1";
pub const TEST_SKEY: &str = "Zh5eGmUq9zpfQnyUIu5OL9iWoMMv5ZNmk3zLJ4Ep";

/// Start a mock Admin API server.
pub async fn mock_duo_server() -> MockServer {
    MockServer::start().await
}

/// Signed client pointed at a mock server.
pub fn test_caller(mock_server: &MockServer) -> Arc<dyn SignedCaller> {
    Arc::new(
        DuoApiClient::new(
            TEST_IKEY,
            SecretString::new(TEST_SKEY.into()),
            &mock_server.uri(),
            ClientOptions {
                insecure: false,
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap(),
    )
}

/// Provider with every handler backed by the mock server.
pub fn test_provider(mock_server: &MockServer) -> Provider {
    Provider::new(test_caller(mock_server))
}

/// Environment as the plugin would see it.
pub fn test_env(mock_server: &MockServer) -> DuoEnv {
    DuoEnv {
        ikey: Some(TEST_IKEY.into()),
        skey: Some(SecretString::new(TEST_SKEY.into())),
        api_host: Some(mock_server.uri()),
        insecure: None,
        log_level: None,
    }
}

/// `stat: OK` envelope.
pub fn ok(response: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"stat": "OK", "response": response}))
}

/// `stat: FAIL` envelope.
pub fn fail(status: u16, code: u32, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "stat": "FAIL",
        "code": code,
        "message": message
    }))
}
