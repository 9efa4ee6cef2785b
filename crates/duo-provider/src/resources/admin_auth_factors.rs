//! `duo_admin_auth_factors` resource.
//!
//! The account has exactly one set of allowed administrator authentication
//! methods. Creating the resource takes over management of it; deleting it
//! only stops managing it, since the methods cannot be removed remotely.

use super::{deserialize_flag, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::Result;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

const AUTH_METHODS_PATH: &str = "/admin/v1/admins/allowed_auth_methods";

/// Identifier of the singleton.
pub const AUTH_FACTORS_ID: &str = "allowed_auth_methods";

const FACTORS: [&str; 8] = [
    "push_enabled",
    "sms_enabled",
    "voice_enabled",
    "mobile_otp_enabled",
    "hardware_token_enabled",
    "yubikey_enabled",
    "webauthn_enabled",
    "verified_push_enabled",
];

/// Declared authentication methods. Unset methods keep their remote value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminAuthFactorsArgs {
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub push_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub sms_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub voice_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub mobile_otp_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub hardware_token_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub yubikey_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub webauthn_enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub verified_push_enabled: Option<bool>,
}

impl AdminAuthFactorsArgs {
    fn params(&self) -> ParamsBuilder {
        ParamsBuilder::new()
            .boolean("push_enabled", self.push_enabled)
            .boolean("sms_enabled", self.sms_enabled)
            .boolean("voice_enabled", self.voice_enabled)
            .boolean("mobile_otp_enabled", self.mobile_otp_enabled)
            .boolean("hardware_token_enabled", self.hardware_token_enabled)
            .boolean("yubikey_enabled", self.yubikey_enabled)
            .boolean("webauthn_enabled", self.webauthn_enabled)
            .boolean("verified_push_enabled", self.verified_push_enabled)
    }
}

/// Allowed methods as kept in local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAuthFactorsState {
    pub id: String,
    #[serde(flatten)]
    pub args: AdminAuthFactorsArgs,
}

/// Manages the allowed administrator authentication methods.
pub struct AdminAuthFactorsHandler {
    caller: Arc<dyn SignedCaller>,
}

impl AdminAuthFactorsHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn fetch(&self) -> Result<AdminAuthFactorsState> {
        let response = self
            .caller
            .signed_call(Method::GET, AUTH_METHODS_PATH, &Params::new())
            .await?;

        let args: AdminAuthFactorsArgs = envelope::parse(&response, || {
            "could not read admin authentication methods".to_string()
        })?;

        Ok(AdminAuthFactorsState {
            id: AUTH_FACTORS_ID.to_string(),
            args,
        })
    }

    async fn post(&self, params: &Params) -> Result<AdminAuthFactorsState> {
        let response = self
            .caller
            .signed_call(Method::POST, AUTH_METHODS_PATH, params)
            .await?;

        envelope::check(&response, || {
            "could not update admin authentication methods".to_string()
        })?;

        self.fetch().await
    }
}

#[async_trait]
impl ResourceHandler for AdminAuthFactorsHandler {
    type Args = AdminAuthFactorsArgs;
    type State = AdminAuthFactorsState;

    fn schema(&self) -> ResourceSchema {
        FACTORS
            .into_iter()
            .fold(ResourceSchema::new("duo_admin_auth_factors"), |schema, factor| {
                schema.with(AttributeSchema::optional_computed(factor, AttributeType::Bool))
            })
    }

    #[instrument(skip(self, args))]
    async fn create(&self, args: &AdminAuthFactorsArgs) -> Result<AdminAuthFactorsState> {
        let state = self.post(&args.params().build()).await?;
        info!("Managing admin authentication methods");
        Ok(state)
    }

    #[instrument(skip(self, _state))]
    async fn read(&self, _state: &AdminAuthFactorsState) -> Result<AdminAuthFactorsState> {
        self.fetch().await
    }

    #[instrument(skip(self, _prior, args))]
    async fn update(
        &self,
        _prior: &AdminAuthFactorsState,
        args: &AdminAuthFactorsArgs,
        changed: &[&'static str],
    ) -> Result<AdminAuthFactorsState> {
        let state = self.post(&args.params().only(changed)).await?;
        info!("Updated admin authentication methods ({})", changed.join(", "));
        Ok(state)
    }

    #[instrument(skip(self, _state))]
    async fn delete(&self, _state: &AdminAuthFactorsState) -> Result<()> {
        info!("No longer managing admin authentication methods; remote settings left unchanged");
        Ok(())
    }
}
