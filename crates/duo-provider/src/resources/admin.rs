//! `duo_admin` resource.

use super::{join_path, non_empty, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::Result;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

const ADMINS_PATH: &str = "/admin/v1/admins";

fn admin_path(admin_id: &str) -> String {
    join_path(ADMINS_PATH, &[admin_id])
}

/// Declared administrator attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminArgs {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_by_admin_units: Option<bool>,
}

impl AdminArgs {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn params(&self) -> ParamsBuilder {
        ParamsBuilder::new()
            .set("email", &self.email)
            .set("name", &self.name)
            .opt("phone", self.phone.as_deref())
            .opt("role", self.role.as_deref())
            .boolean("restricted_by_admin_units", self.restricted_by_admin_units)
    }
}

/// Administrator as kept in local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminState {
    pub id: String,
    #[serde(flatten)]
    pub args: AdminArgs,
    pub status: Option<String>,
    pub last_login: Option<i64>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct AdminRecord {
    admin_id: String,
    email: String,
    name: String,
    phone: Option<String>,
    role: Option<String>,
    status: Option<String>,
    last_login: Option<i64>,
    created: Option<i64>,
    restricted_by_admin_units: Option<bool>,
}

impl From<AdminRecord> for AdminState {
    fn from(record: AdminRecord) -> Self {
        Self {
            id: record.admin_id,
            args: AdminArgs {
                email: record.email,
                name: record.name,
                phone: non_empty(record.phone),
                role: non_empty(record.role),
                restricted_by_admin_units: record.restricted_by_admin_units,
            },
            status: non_empty(record.status),
            last_login: record.last_login,
            created: record.created,
        }
    }
}

/// Manages administrators.
pub struct AdminHandler {
    caller: Arc<dyn SignedCaller>,
}

impl AdminHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn fetch(&self, admin_id: &str) -> Result<AdminState> {
        let response = self
            .caller
            .signed_call(Method::GET, &admin_path(admin_id), &Params::new())
            .await?;

        let record: AdminRecord =
            envelope::parse(&response, || format!("could not read admin {}", admin_id))
                .map_err(|e| e.or_not_found(format!("admin {}", admin_id)))?;

        Ok(record.into())
    }
}

#[async_trait]
impl ResourceHandler for AdminHandler {
    type Args = AdminArgs;
    type State = AdminState;

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("duo_admin")
            .with(
                AttributeSchema::required("email", AttributeType::String)
                    .force_new()
                    .describe("Login email; cannot be changed once created"),
            )
            .with(AttributeSchema::required("name", AttributeType::String))
            .with(AttributeSchema::optional("phone", AttributeType::String))
            .with(
                AttributeSchema::optional_computed("role", AttributeType::String)
                    .describe("Administrative role, e.g. Owner or Help Desk"),
            )
            .with(AttributeSchema::optional_computed(
                "restricted_by_admin_units",
                AttributeType::Bool,
            ))
            .with(AttributeSchema::computed("status", AttributeType::String))
            .with(AttributeSchema::computed("last_login", AttributeType::Integer))
            .with(AttributeSchema::computed("created", AttributeType::Integer))
    }

    #[instrument(skip(self, args), fields(email = %args.email))]
    async fn create(&self, args: &AdminArgs) -> Result<AdminState> {
        let response = self
            .caller
            .signed_call(Method::POST, ADMINS_PATH, &args.params().build())
            .await?;

        let record: AdminRecord = envelope::parse(&response, || {
            format!("could not create admin {}", args.email)
        })?;

        info!("Created admin {} ({})", args.email, record.admin_id);
        self.fetch(&record.admin_id).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &AdminState) -> Result<AdminState> {
        self.fetch(&state.id).await
    }

    #[instrument(skip(self, prior, args), fields(id = %prior.id))]
    async fn update(
        &self,
        prior: &AdminState,
        args: &AdminArgs,
        changed: &[&'static str],
    ) -> Result<AdminState> {
        let response = self
            .caller
            .signed_call(Method::POST, &admin_path(&prior.id), &args.params().only(changed))
            .await?;

        envelope::check(&response, || format!("could not update admin {}", prior.id))?;

        info!("Updated admin {} ({})", prior.id, changed.join(", "));
        self.fetch(&prior.id).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &AdminState) -> Result<()> {
        let response = self
            .caller
            .signed_call(Method::DELETE, &admin_path(&state.id), &Params::new())
            .await?;

        envelope::check(&response, || format!("could not delete admin {}", state.id))?;

        info!("Deleted admin {}", state.id);
        Ok(())
    }
}
