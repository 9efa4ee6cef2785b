//! Duo API call types.

use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::BTreeMap;

/// Request parameters, kept sorted by name for canonicalization.
pub type Params = BTreeMap<String, String>;

/// Raw outcome of a signed call.
///
/// Non-2xx statuses are not errors at this layer: the Admin API reports
/// failures inside its JSON envelope, which callers decode themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,

    /// Unparsed response body
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response carrying a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to issue an authenticated Admin API call.
#[async_trait]
pub trait SignedCaller: Send + Sync {
    /// Sign and send one request, returning the raw response.
    async fn signed_call(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<ApiResponse, ClientError>;
}
