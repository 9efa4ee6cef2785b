//! Resource handlers, one per Admin API entity type.

mod admin;
mod admin_auth_factors;
mod integration;
mod phone;
mod user;
mod user_group_association;
mod user_phone_association;

pub use admin::{AdminArgs, AdminHandler, AdminState};
pub use admin_auth_factors::{AdminAuthFactorsArgs, AdminAuthFactorsHandler, AdminAuthFactorsState};
pub use integration::{IntegrationArgs, IntegrationHandler, IntegrationState};
pub use phone::{PhoneArgs, PhoneHandler, PhoneState, PhoneType};
pub use user::{UserArgs, UserHandler, UserState, UserStatus};
pub use user_group_association::{
    UserGroupAssociationArgs, UserGroupAssociationHandler, UserGroupAssociationState,
};
pub use user_phone_association::{
    UserPhoneAssociationArgs, UserPhoneAssociationHandler, UserPhoneAssociationState,
};

use crate::error::{ProviderError, Result};
use crate::schema::ResourceSchema;
use async_trait::async_trait;
use duo_api_client::Params;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// CRUD operations for one resource type, over typed attributes.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Declared attributes.
    type Args: Serialize + DeserializeOwned + Send + Sync;

    /// Declared plus computed attributes, as kept in local state.
    type State: Serialize + DeserializeOwned + Send + Sync;

    fn schema(&self) -> ResourceSchema;

    /// Create the remote resource and read it back.
    async fn create(&self, args: &Self::Args) -> Result<Self::State>;

    /// Refresh state from the remote side. Absence is [`ProviderError::NotFound`].
    async fn read(&self, state: &Self::State) -> Result<Self::State>;

    /// Apply the `changed` attributes of `args` in place and read back.
    async fn update(
        &self,
        _prior: &Self::State,
        _args: &Self::Args,
        _changed: &[&'static str],
    ) -> Result<Self::State> {
        Err(ProviderError::UpdateNotSupported(
            ResourceHandler::schema(self).type_name,
        ))
    }

    async fn delete(&self, state: &Self::State) -> Result<()>;
}

/// Type-erased [`ResourceHandler`] working on JSON attribute maps.
#[async_trait]
pub trait DynResource: Send + Sync {
    fn schema(&self) -> ResourceSchema;

    async fn create_json(&self, args: Value) -> Result<Value>;

    async fn read_json(&self, state: Value) -> Result<Value>;

    async fn update_json(&self, prior: Value, args: Value) -> Result<Value>;

    async fn delete_json(&self, state: Value) -> Result<()>;
}

#[async_trait]
impl<H: ResourceHandler> DynResource for H {
    fn schema(&self) -> ResourceSchema {
        ResourceHandler::schema(self)
    }

    async fn create_json(&self, args: Value) -> Result<Value> {
        let schema = ResourceHandler::schema(self);
        let args: H::Args = decode_args(&schema, args)?;
        let state = ResourceHandler::create(self, &args).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn read_json(&self, state: Value) -> Result<Value> {
        let schema = ResourceHandler::schema(self);
        let state: H::State = decode_state(&schema, state)?;
        let state = ResourceHandler::read(self, &state).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn update_json(&self, prior: Value, args: Value) -> Result<Value> {
        let schema = ResourceHandler::schema(self);
        schema.validate(&args)?;

        let changed = schema.changed_attributes(&prior, &args);
        let replace = schema.replacement_fields(&changed);
        if !replace.is_empty() {
            return Err(ProviderError::invalid(
                schema.type_name,
                format!("changing {} requires replacement", replace.join(", ")),
            ));
        }

        let prior: H::State = decode_state(&schema, prior)?;
        if changed.is_empty() {
            return Ok(serde_json::to_value(prior)?);
        }

        let args: H::Args = decode_args(&schema, args)?;
        let state = ResourceHandler::update(self, &prior, &args, &changed).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn delete_json(&self, state: Value) -> Result<()> {
        let schema = ResourceHandler::schema(self);
        let state: H::State = decode_state(&schema, state)?;
        ResourceHandler::delete(self, &state).await
    }
}

fn decode_args<T: DeserializeOwned>(schema: &ResourceSchema, args: Value) -> Result<T> {
    schema.validate(&args)?;
    serde_json::from_value(args).map_err(|e| ProviderError::invalid(schema.type_name, e.to_string()))
}

fn decode_state<T: DeserializeOwned>(schema: &ResourceSchema, state: Value) -> Result<T> {
    serde_json::from_value(state)
        .map_err(|e| ProviderError::invalid(schema.type_name, format!("invalid state: {}", e)))
}

/// Local identifier of a relationship that has none remotely.
pub fn composite_id(first: &str, second: &str) -> String {
    format!("{}-{}", first, second)
}

/// Incrementally built request parameters.
#[derive(Debug, Default)]
pub(crate) struct ParamsBuilder(Params);

impl ParamsBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub(crate) fn boolean(self, key: &str, value: Option<bool>) -> Self {
        self.opt(key, value.map(|b| if b { "true" } else { "false" }))
    }

    /// Booleans encoded as `1` / `0`.
    pub(crate) fn flag(self, key: &str, value: Option<bool>) -> Self {
        self.opt(key, value.map(|b| if b { "1" } else { "0" }))
    }

    pub(crate) fn build(self) -> Params {
        self.0
    }

    /// Keep only `changed` keys. A changed key with no value is sent empty,
    /// which clears it remotely.
    pub(crate) fn only(self, changed: &[&str]) -> Params {
        let mut all = self.0;
        changed
            .iter()
            .map(|key| (key.to_string(), all.remove(*key).unwrap_or_default()))
            .collect()
    }
}

/// Append percent-encoded path segments to `base`.
pub(crate) fn join_path(base: &str, segments: &[&str]) -> String {
    segments.iter().fold(base.to_string(), |mut path, segment| {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
        path
    })
}

/// The Admin API reports unset strings as `""`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Accept booleans sent as `true`, `1` or `"1"`.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_i64().is_some_and(|n| n != 0)),
        Some(Value::String(s)) => Some(matches!(s.as_str(), "1" | "true")),
        _ => None,
    })
}
