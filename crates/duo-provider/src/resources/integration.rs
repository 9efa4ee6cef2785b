//! `duo_integration` resource.
//!
//! Integrations are identified by their integration key. The secret key is
//! only known after creation and is kept in state as a sensitive computed
//! attribute.

use super::{deserialize_flag, join_path, non_empty, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::Result;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

const INTEGRATIONS_PATH: &str = "/admin/v1/integrations";

const ADMINAPI_FLAGS: [&str; 7] = [
    "adminapi_admins",
    "adminapi_info",
    "adminapi_integrations",
    "adminapi_read_log",
    "adminapi_read_resource",
    "adminapi_settings",
    "adminapi_write_resource",
];

fn integration_path(ikey: &str) -> String {
    join_path(INTEGRATIONS_PATH, &[ikey])
}

/// Declared integration attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationArgs {
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_admins: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_info: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_integrations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_read_log: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_read_resource: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_settings: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adminapi_write_resource: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_service_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_normalization_policy: Option<String>,
}

impl IntegrationArgs {
    pub fn new(name: impl Into<String>, integration_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            integration_type: integration_type.into(),
            ..Default::default()
        }
    }

    fn params(&self) -> ParamsBuilder {
        ParamsBuilder::new()
            .set("name", &self.name)
            .set("type", &self.integration_type)
            .opt("notes", self.notes.as_deref())
            .opt("greeting", self.greeting.as_deref())
            .flag("adminapi_admins", self.adminapi_admins)
            .flag("adminapi_info", self.adminapi_info)
            .flag("adminapi_integrations", self.adminapi_integrations)
            .flag("adminapi_read_log", self.adminapi_read_log)
            .flag("adminapi_read_resource", self.adminapi_read_resource)
            .flag("adminapi_settings", self.adminapi_settings)
            .flag("adminapi_write_resource", self.adminapi_write_resource)
            .flag("self_service_allowed", self.self_service_allowed)
            .opt(
                "username_normalization_policy",
                self.username_normalization_policy.as_deref(),
            )
    }
}

/// Integration as kept in local state.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationState {
    /// Integration key
    pub id: String,
    #[serde(flatten)]
    pub args: IntegrationArgs,
    pub secret_key: Option<String>,
}

impl fmt::Debug for IntegrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationState")
            .field("id", &self.id)
            .field("args", &self.args)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct IntegrationRecord {
    integration_key: String,
    secret_key: Option<String>,
    name: String,
    #[serde(rename = "type")]
    integration_type: String,
    notes: Option<String>,
    greeting: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_admins: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_info: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_integrations: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_read_log: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_read_resource: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_settings: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    adminapi_write_resource: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    self_service_allowed: Option<bool>,
    username_normalization_policy: Option<String>,
}

impl From<IntegrationRecord> for IntegrationState {
    fn from(record: IntegrationRecord) -> Self {
        Self {
            id: record.integration_key,
            args: IntegrationArgs {
                name: record.name,
                integration_type: record.integration_type,
                notes: non_empty(record.notes),
                greeting: non_empty(record.greeting),
                adminapi_admins: record.adminapi_admins,
                adminapi_info: record.adminapi_info,
                adminapi_integrations: record.adminapi_integrations,
                adminapi_read_log: record.adminapi_read_log,
                adminapi_read_resource: record.adminapi_read_resource,
                adminapi_settings: record.adminapi_settings,
                adminapi_write_resource: record.adminapi_write_resource,
                self_service_allowed: record.self_service_allowed,
                username_normalization_policy: non_empty(record.username_normalization_policy),
            },
            secret_key: non_empty(record.secret_key),
        }
    }
}

/// Manages integrations.
pub struct IntegrationHandler {
    caller: Arc<dyn SignedCaller>,
}

impl IntegrationHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn fetch(&self, ikey: &str) -> Result<IntegrationState> {
        let response = self
            .caller
            .signed_call(Method::GET, &integration_path(ikey), &Params::new())
            .await?;

        let record: IntegrationRecord =
            envelope::parse(&response, || format!("could not read integration {}", ikey))
                .map_err(|e| e.or_not_found(format!("integration {}", ikey)))?;

        Ok(record.into())
    }
}

#[async_trait]
impl ResourceHandler for IntegrationHandler {
    type Args = IntegrationArgs;
    type State = IntegrationState;

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new("duo_integration")
            .with(AttributeSchema::required("name", AttributeType::String))
            .with(
                AttributeSchema::required("type", AttributeType::String)
                    .force_new()
                    .describe("Integration type, e.g. adminapi or websdk"),
            )
            .with(AttributeSchema::optional("notes", AttributeType::String))
            .with(AttributeSchema::optional("greeting", AttributeType::String));

        ADMINAPI_FLAGS
            .into_iter()
            .fold(schema, |schema, flag| {
                schema.with(AttributeSchema::optional_computed(flag, AttributeType::Bool))
            })
            .with(AttributeSchema::optional_computed(
                "self_service_allowed",
                AttributeType::Bool,
            ))
            .with(
                AttributeSchema::optional_computed(
                    "username_normalization_policy",
                    AttributeType::String,
                )
                .describe("None or Simple; the service defaults to None"),
            )
            .with(AttributeSchema::computed("secret_key", AttributeType::String).sensitive())
    }

    #[instrument(skip(self, args), fields(name = %args.name))]
    async fn create(&self, args: &IntegrationArgs) -> Result<IntegrationState> {
        let response = self
            .caller
            .signed_call(Method::POST, INTEGRATIONS_PATH, &args.params().build())
            .await?;

        let record: IntegrationRecord = envelope::parse(&response, || {
            format!("could not create integration {}", args.name)
        })?;

        info!("Created integration {} ({})", args.name, record.integration_key);
        self.fetch(&record.integration_key).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &IntegrationState) -> Result<IntegrationState> {
        self.fetch(&state.id).await
    }

    #[instrument(skip(self, prior, args), fields(id = %prior.id))]
    async fn update(
        &self,
        prior: &IntegrationState,
        args: &IntegrationArgs,
        changed: &[&'static str],
    ) -> Result<IntegrationState> {
        let response = self
            .caller
            .signed_call(
                Method::POST,
                &integration_path(&prior.id),
                &args.params().only(changed),
            )
            .await?;

        envelope::check(&response, || {
            format!("could not update integration {}", prior.id)
        })?;

        info!("Updated integration {} ({})", prior.id, changed.join(", "));
        self.fetch(&prior.id).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &IntegrationState) -> Result<()> {
        let response = self
            .caller
            .signed_call(Method::DELETE, &integration_path(&state.id), &Params::new())
            .await?;

        envelope::check(&response, || {
            format!("could not delete integration {}", state.id)
        })?;

        info!("Deleted integration {}", state.id);
        Ok(())
    }
}
