//! Line-delimited JSON protocol spoken with the host tool.
//!
//! Each request is one JSON object tagged by `op`, each response one JSON
//! object tagged by `status`.

use crate::config::{self, DuoEnv, ProviderConfig};
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A request from the host tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Configure {
        /// Decoded by [`ProviderConfig::from_value`] so that field errors
        /// are reported as configuration errors.
        #[serde(default)]
        config: Value,
    },
    Schemas,
    Plan {
        resource_type: String,
        #[serde(default)]
        prior: Option<Value>,
        #[serde(default)]
        planned: Option<Value>,
    },
    Create {
        resource_type: String,
        args: Value,
    },
    Read {
        resource_type: String,
        state: Value,
    },
    Update {
        resource_type: String,
        prior: Value,
        args: Value,
    },
    Delete {
        resource_type: String,
        state: Value,
    },
    Apply {
        resource_type: String,
        #[serde(default)]
        prior: Option<Value>,
        #[serde(default)]
        planned: Option<Value>,
    },
}

/// Reply to a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { result: Value },
    Error { kind: String, message: String },
}

impl Response {
    fn error(kind: &str, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<Result<Value>> for Response {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(result) => Response::Ok { result },
            Err(e) => Response::error(e.kind(), e.to_string()),
        }
    }
}

/// Protocol state for one host connection.
pub struct Session {
    env: DuoEnv,
    provider: Option<Provider>,
}

impl Session {
    pub fn new(env: DuoEnv) -> Self {
        Self {
            env,
            provider: None,
        }
    }

    /// Session that is already configured.
    pub fn with_provider(provider: Provider) -> Self {
        Self {
            env: DuoEnv::default(),
            provider: Some(provider),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Decode and handle one input line.
    pub async fn handle_line(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await.into(),
            Err(e) => {
                warn!("Rejected malformed request: {}", e);
                Response::error("invalid_request", e.to_string())
            }
        }
    }

    fn provider(&self) -> Result<&Provider> {
        self.provider.as_ref().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }

    pub async fn handle(&mut self, request: Request) -> Result<Value> {
        debug!("Handling {:?}", request);

        match request {
            Request::Configure { config } => {
                let config = ProviderConfig::from_value(config)?;
                let caller = config::configure(&config, &self.env)?;
                let provider = Provider::new(caller);
                let types = provider.resource_types();
                self.provider = Some(provider);
                Ok(serde_json::to_value(types)?)
            }
            Request::Schemas => Ok(serde_json::to_value(self.provider()?.schemas())?),
            Request::Plan {
                resource_type,
                prior,
                planned,
            } => {
                let change =
                    self.provider()?
                        .plan(&resource_type, prior.as_ref(), planned.as_ref())?;
                Ok(serde_json::to_value(change)?)
            }
            Request::Create {
                resource_type,
                args,
            } => self.provider()?.create(&resource_type, args).await,
            Request::Read {
                resource_type,
                state,
            } => Ok(self
                .provider()?
                .read(&resource_type, state)
                .await?
                .unwrap_or(Value::Null)),
            Request::Update {
                resource_type,
                prior,
                args,
            } => self.provider()?.update(&resource_type, prior, args).await,
            Request::Delete {
                resource_type,
                state,
            } => {
                self.provider()?.delete(&resource_type, state).await?;
                Ok(Value::Null)
            }
            Request::Apply {
                resource_type,
                prior,
                planned,
            } => Ok(self
                .provider()?
                .apply(&resource_type, prior, planned)
                .await?
                .unwrap_or(Value::Null)),
        }
    }
}
