//! Provider configuration.
//!
//! Settings come from the declarative provider block, with `DUO_*`
//! environment variables (and a `.env` file) as fallbacks. The secret key is
//! only ever read from `DUO_SKEY` so that it never ends up in configuration
//! files or state.

use crate::error::{ProviderError, Result};
use duo_api_client::{ClientOptions, DuoApiClient, SignedCaller, DEFAULT_TIMEOUT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const SKEY_ENV: &str = "DUO_SKEY";
pub const IKEY_ENV: &str = "DUO_IKEY";
pub const API_HOST_ENV: &str = "DUO_API_HOST";
pub const INSECURE_ENV: &str = "DUO_INSECURE";

/// Declarative provider block, as sent by the host tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Integration key
    #[serde(default)]
    pub ikey: Option<String>,

    /// Never accepted here; see [`SKEY_ENV`].
    #[serde(default)]
    pub skey: Option<SecretString>,

    /// API hostname, e.g. `api-xxxxxxxx.duosecurity.com`
    #[serde(default)]
    pub api_host: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: Option<bool>,

    /// Per-request timeout
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    /// Decode a provider block as sent over the protocol.
    ///
    /// A secret key in the block is rejected before any other field is
    /// looked at, whatever its type.
    pub fn from_value(block: Value) -> Result<Self> {
        if block.is_null() {
            return Ok(Self::default());
        }

        let skey_set = block
            .get("skey")
            .is_some_and(|skey| !skey.is_null() && skey.as_str() != Some(""));
        if skey_set {
            return Err(skey_in_block());
        }

        serde_json::from_value(block)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider block: {}", e)))
    }
}

fn skey_in_block() -> ProviderError {
    ProviderError::Configuration(format!(
        "skey must not be set in the provider configuration, use the {} environment variable",
        SKEY_ENV
    ))
}

/// `DUO_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuoEnv {
    #[serde(default)]
    pub ikey: Option<String>,

    #[serde(default)]
    pub skey: Option<SecretString>,

    #[serde(default)]
    pub api_host: Option<String>,

    #[serde(default)]
    pub insecure: Option<bool>,

    /// Log level used when `RUST_LOG` is unset
    #[serde(default)]
    pub log_level: Option<String>,
}

impl DuoEnv {
    /// Load from the process environment, after reading `.env` if present.
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;

        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("DUO")
                    // Keys and hosts must stay strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// Everything needed to build a client.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub ikey: String,
    pub skey: SecretString,
    pub api_host: String,
    pub options: ClientOptions,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge the provider block with the environment.
///
/// The provider block wins for every setting except the secret key, which
/// must come from the environment.
pub fn resolve(config: &ProviderConfig, env: &DuoEnv) -> Result<Credentials> {
    if config
        .skey
        .as_ref()
        .is_some_and(|s| !s.expose_secret().is_empty())
    {
        return Err(skey_in_block());
    }

    let skey = env
        .skey
        .as_ref()
        .filter(|s| !s.expose_secret().is_empty())
        .cloned()
        .ok_or_else(|| {
            ProviderError::Configuration(format!("{} environment variable is not set", SKEY_ENV))
        })?;

    let ikey = present(&config.ikey)
        .or_else(|| present(&env.ikey))
        .ok_or_else(|| {
            ProviderError::Configuration(format!("ikey is required (or set {})", IKEY_ENV))
        })?;

    let api_host = present(&config.api_host)
        .or_else(|| present(&env.api_host))
        .ok_or_else(|| {
            ProviderError::Configuration(format!("api_host is required (or set {})", API_HOST_ENV))
        })?;

    let insecure = config.insecure.or(env.insecure).unwrap_or(false);

    Ok(Credentials {
        ikey: ikey.to_string(),
        skey,
        api_host: api_host.to_string(),
        options: ClientOptions {
            insecure,
            timeout: config.timeout.unwrap_or(DEFAULT_TIMEOUT),
        },
    })
}

/// Validate configuration and build the shared signed caller.
///
/// No network call is made.
pub fn configure(config: &ProviderConfig, env: &DuoEnv) -> Result<Arc<dyn SignedCaller>> {
    let credentials = resolve(config, env)?;

    let client = DuoApiClient::new(
        &credentials.ikey,
        credentials.skey,
        &credentials.api_host,
        credentials.options,
    )
    .map_err(|e| ProviderError::Configuration(e.to_string()))?;

    info!("Configured Duo Admin API client for {}", client.host());
    Ok(Arc::new(client))
}
