//! `duo_user` resource.

use super::{join_path, non_empty, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::Result;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

pub(crate) const USERS_PATH: &str = "/admin/v1/users";

pub(crate) fn user_path(user_id: &str) -> String {
    join_path(USERS_PATH, &[user_id])
}

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "bypass")]
    Bypass,
    #[serde(rename = "disabled")]
    Disabled,
    /// Set by the service after too many failed attempts.
    #[serde(rename = "locked out")]
    LockedOut,
    #[serde(rename = "pending deletion")]
    PendingDeletion,
}

impl UserStatus {
    /// Statuses that can be declared. The others are only ever set by the
    /// service.
    pub const DECLARABLE: &'static [&'static str] = &["active", "bypass", "disabled"];

    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Bypass => "bypass",
            UserStatus::Disabled => "disabled",
            UserStatus::LockedOut => "locked out",
            UserStatus::PendingDeletion => "pending deletion",
        }
    }
}

/// Declared user attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserArgs {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UserArgs {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    fn params(&self) -> ParamsBuilder {
        ParamsBuilder::new()
            .set("username", &self.username)
            .opt("realname", self.realname.as_deref())
            .opt("email", self.email.as_deref())
            .opt("firstname", self.firstname.as_deref())
            .opt("lastname", self.lastname.as_deref())
            .opt("status", self.status.map(UserStatus::as_str))
            .opt("notes", self.notes.as_deref())
    }
}

/// User as kept in local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub id: String,
    #[serde(flatten)]
    pub args: UserArgs,
    #[serde(default)]
    pub is_enrolled: bool,
    pub last_login: Option<i64>,
    pub created: Option<i64>,
}

/// Phone entry embedded in a user record.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserPhone {
    pub phone_id: String,
}

/// User as returned by the Admin API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub status: Option<UserStatus>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_enrolled: bool,
    pub last_login: Option<i64>,
    pub created: Option<i64>,
    #[serde(default)]
    pub phones: Vec<UserPhone>,
}

impl From<UserRecord> for UserState {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.user_id,
            args: UserArgs {
                username: record.username,
                realname: non_empty(record.realname),
                email: non_empty(record.email),
                firstname: non_empty(record.firstname),
                lastname: non_empty(record.lastname),
                status: record.status,
                notes: non_empty(record.notes),
            },
            is_enrolled: record.is_enrolled,
            last_login: record.last_login,
            created: record.created,
        }
    }
}

/// Manages users.
pub struct UserHandler {
    caller: Arc<dyn SignedCaller>,
}

impl UserHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn fetch(&self, user_id: &str) -> Result<UserState> {
        let response = self
            .caller
            .signed_call(Method::GET, &user_path(user_id), &Params::new())
            .await?;

        let record: UserRecord =
            envelope::parse(&response, || format!("could not read user {}", user_id))
                .map_err(|e| e.or_not_found(format!("user {}", user_id)))?;

        Ok(record.into())
    }
}

#[async_trait]
impl ResourceHandler for UserHandler {
    type Args = UserArgs;
    type State = UserState;

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("duo_user")
            .with(AttributeSchema::required("username", AttributeType::String))
            .with(AttributeSchema::optional("realname", AttributeType::String))
            .with(AttributeSchema::optional("email", AttributeType::String))
            .with(AttributeSchema::optional("firstname", AttributeType::String))
            .with(AttributeSchema::optional("lastname", AttributeType::String))
            .with(
                AttributeSchema::optional_computed("status", AttributeType::String)
                    .one_of(UserStatus::DECLARABLE)
                    .describe("One of active, bypass or disabled"),
            )
            .with(AttributeSchema::optional("notes", AttributeType::String))
            .with(AttributeSchema::computed("is_enrolled", AttributeType::Bool))
            .with(AttributeSchema::computed("last_login", AttributeType::Integer))
            .with(AttributeSchema::computed("created", AttributeType::Integer))
    }

    #[instrument(skip(self, args), fields(username = %args.username))]
    async fn create(&self, args: &UserArgs) -> Result<UserState> {
        let response = self
            .caller
            .signed_call(Method::POST, USERS_PATH, &args.params().build())
            .await?;

        let record: UserRecord = envelope::parse(&response, || {
            format!("could not create user {}", args.username)
        })?;

        info!("Created user {} ({})", args.username, record.user_id);
        self.fetch(&record.user_id).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &UserState) -> Result<UserState> {
        self.fetch(&state.id).await
    }

    #[instrument(skip(self, prior, args), fields(id = %prior.id))]
    async fn update(
        &self,
        prior: &UserState,
        args: &UserArgs,
        changed: &[&'static str],
    ) -> Result<UserState> {
        let response = self
            .caller
            .signed_call(Method::POST, &user_path(&prior.id), &args.params().only(changed))
            .await?;

        envelope::check(&response, || format!("could not update user {}", prior.id))?;

        info!("Updated user {} ({})", prior.id, changed.join(", "));
        self.fetch(&prior.id).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &UserState) -> Result<()> {
        let response = self
            .caller
            .signed_call(Method::DELETE, &user_path(&state.id), &Params::new())
            .await?;

        envelope::check(&response, || format!("could not delete user {}", state.id))?;

        info!("Deleted user {}", state.id);
        Ok(())
    }
}
