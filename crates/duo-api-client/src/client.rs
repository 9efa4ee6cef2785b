//! Duo Admin API HTTP client.

use crate::error::ClientError;
use crate::signing::{canonical_params, canonicalize, sign, DATE_FORMAT};
use crate::types::{ApiResponse, Params, SignedCaller};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::{Client, Method, Url};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// User agent sent with every call.
pub const USER_AGENT: &str = concat!("duo-provider/", env!("CARGO_PKG_VERSION"));

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport options for [`DuoApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Skip TLS certificate and host name verification
    pub insecure: bool,

    /// Timeout applied to every call
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Signed Admin API client.
///
/// The secret key is stored using `SecretString` so it never shows up in
/// logs or debug output.
#[derive(Clone, Debug)]
pub struct DuoApiClient {
    client: Client,
    base_url: Url,
    host: String,
    ikey: String,
    skey: SecretString,
}

impl DuoApiClient {
    /// Create a new client.
    ///
    /// `api_host` is either a bare host name (HTTPS is implied) or a full
    /// base URL such as `http://127.0.0.1:8080`.
    pub fn new(
        ikey: impl Into<String>,
        skey: SecretString,
        api_host: &str,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let (base_url, host) = parse_api_host(api_host)?;

        if options.insecure {
            warn!("TLS certificate verification disabled for {}", host);
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(options.insecure)
            .build()?;

        Ok(Self {
            client,
            base_url,
            host,
            ikey: ikey.into(),
            skey,
        })
    }

    /// Host name used in request signatures.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Integration key identifying this client.
    pub fn ikey(&self) -> &str {
        &self.ikey
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SignedCaller for DuoApiClient {
    #[instrument(skip(self, params), fields(param_count = params.len()))]
    async fn signed_call(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<ApiResponse, ClientError> {
        let date = Utc::now().format(DATE_FORMAT).to_string();
        let canonical = canonicalize(&date, &method, &self.host, path, params);
        let authorization = sign(&self.ikey, &self.skey, &canonical)?;
        let encoded = canonical_params(params);

        let request = if method == Method::POST || method == Method::PUT {
            self.client
                .request(method.clone(), self.url(path))
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded)
        } else {
            let mut url = self.url(path);
            if !encoded.is_empty() {
                url.push('?');
                url.push_str(&encoded);
            }
            self.client.request(method.clone(), url)
        };

        let response = request
            .header(DATE, date.as_str())
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!("{} {} -> {} ({} bytes)", method, path, status, body.len());
        Ok(ApiResponse::new(status, body))
    }
}

fn parse_api_host(api_host: &str) -> Result<(Url, String), ClientError> {
    let api_host = api_host.trim();
    if api_host.is_empty() {
        return Err(ClientError::InvalidHost("empty host".into()));
    }

    let raw = if api_host.contains("://") {
        api_host.to_string()
    } else {
        format!("https://{}", api_host)
    };

    let url = Url::parse(&raw).map_err(|e| ClientError::InvalidHost(format!("{}: {}", api_host, e)))?;
    let name = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidHost(api_host.to_string()))?;

    let host = match url.port() {
        Some(port) => format!("{}:{}", name, port),
        None => name.to_string(),
    };

    Ok((url, host))
}
