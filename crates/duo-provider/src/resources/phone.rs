//! `duo_phone` resource.

use super::{join_path, non_empty, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::Result;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

const PHONES_PATH: &str = "/admin/v1/phones";

fn phone_path(phone_id: &str) -> String {
    join_path(PHONES_PATH, &[phone_id])
}

/// Kind of phone line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    Mobile,
    Landline,
    Unknown,
}

impl PhoneType {
    pub fn as_str(self) -> &'static str {
        match self {
            PhoneType::Mobile => "mobile",
            PhoneType::Landline => "landline",
            PhoneType::Unknown => "unknown",
        }
    }

    /// The service echoes types capitalized (`Mobile`).
    fn from_remote(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mobile" => Some(PhoneType::Mobile),
            "landline" => Some(PhoneType::Landline),
            "unknown" => Some(PhoneType::Unknown),
            _ => None,
        }
    }
}

/// Declared phone attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoneArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<PhoneType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl PhoneArgs {
    fn params(&self) -> ParamsBuilder {
        ParamsBuilder::new()
            .opt("number", self.number.as_deref())
            .opt("name", self.name.as_deref())
            .opt("extension", self.extension.as_deref())
            .opt("type", self.phone_type.map(PhoneType::as_str))
            .opt("platform", self.platform.as_deref())
    }
}

/// Phone as kept in local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneState {
    pub id: String,
    #[serde(flatten)]
    pub args: PhoneArgs,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub sms_passcodes_sent: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PhoneRecord {
    phone_id: String,
    number: Option<String>,
    name: Option<String>,
    extension: Option<String>,
    #[serde(rename = "type")]
    phone_type: Option<String>,
    platform: Option<String>,
    #[serde(default)]
    activated: bool,
    #[serde(default)]
    sms_passcodes_sent: bool,
    #[serde(default)]
    capabilities: Vec<String>,
}

impl PhoneRecord {
    /// Map to local state, keeping the declared spelling of `platform` when
    /// the service only changed its case.
    fn into_state(self, declared: Option<&PhoneArgs>) -> PhoneState {
        let platform = match (non_empty(self.platform), declared.and_then(|d| d.platform.as_ref())) {
            (Some(remote), Some(local)) if remote.eq_ignore_ascii_case(local) => Some(local.clone()),
            (remote, _) => remote,
        };

        PhoneState {
            id: self.phone_id,
            args: PhoneArgs {
                number: non_empty(self.number),
                name: non_empty(self.name),
                extension: non_empty(self.extension),
                phone_type: self.phone_type.as_deref().and_then(PhoneType::from_remote),
                platform,
            },
            activated: self.activated,
            sms_passcodes_sent: self.sms_passcodes_sent,
            capabilities: self.capabilities,
        }
    }
}

/// Manages phones.
pub struct PhoneHandler {
    caller: Arc<dyn SignedCaller>,
}

impl PhoneHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn fetch(&self, phone_id: &str, declared: Option<&PhoneArgs>) -> Result<PhoneState> {
        let response = self
            .caller
            .signed_call(Method::GET, &phone_path(phone_id), &Params::new())
            .await?;

        let record: PhoneRecord =
            envelope::parse(&response, || format!("could not read phone {}", phone_id))
                .map_err(|e| e.or_not_found(format!("phone {}", phone_id)))?;

        Ok(record.into_state(declared))
    }
}

#[async_trait]
impl ResourceHandler for PhoneHandler {
    type Args = PhoneArgs;
    type State = PhoneState;

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("duo_phone")
            .with(
                AttributeSchema::optional("number", AttributeType::String)
                    .describe("Phone number in E.164 format"),
            )
            .with(AttributeSchema::optional("name", AttributeType::String))
            .with(AttributeSchema::optional("extension", AttributeType::String))
            .with(
                AttributeSchema::optional_computed("type", AttributeType::String)
                    .force_new()
                    .describe("One of mobile, landline or unknown"),
            )
            .with(
                AttributeSchema::optional_computed("platform", AttributeType::String)
                    .force_new(),
            )
            .with(AttributeSchema::computed("activated", AttributeType::Bool))
            .with(AttributeSchema::computed("sms_passcodes_sent", AttributeType::Bool))
            .with(AttributeSchema::computed("capabilities", AttributeType::List))
    }

    #[instrument(skip(self, args))]
    async fn create(&self, args: &PhoneArgs) -> Result<PhoneState> {
        let response = self
            .caller
            .signed_call(Method::POST, PHONES_PATH, &args.params().build())
            .await?;

        let record: PhoneRecord = envelope::parse(&response, || {
            format!(
                "could not create phone {}",
                args.number.as_deref().unwrap_or("(no number)")
            )
        })?;

        info!("Created phone {}", record.phone_id);
        self.fetch(&record.phone_id, Some(args)).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &PhoneState) -> Result<PhoneState> {
        self.fetch(&state.id, Some(&state.args)).await
    }

    #[instrument(skip(self, prior, args), fields(id = %prior.id))]
    async fn update(
        &self,
        prior: &PhoneState,
        args: &PhoneArgs,
        changed: &[&'static str],
    ) -> Result<PhoneState> {
        let response = self
            .caller
            .signed_call(Method::POST, &phone_path(&prior.id), &args.params().only(changed))
            .await?;

        envelope::check(&response, || format!("could not update phone {}", prior.id))?;

        info!("Updated phone {} ({})", prior.id, changed.join(", "));
        self.fetch(&prior.id, Some(args)).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &PhoneState) -> Result<()> {
        let response = self
            .caller
            .signed_call(Method::DELETE, &phone_path(&state.id), &Params::new())
            .await?;

        envelope::check(&response, || format!("could not delete phone {}", state.id))?;

        info!("Deleted phone {}", state.id);
        Ok(())
    }
}
