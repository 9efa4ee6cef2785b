//! `duo_user_phone_association` resource.

use super::user::{user_path, UserRecord, USERS_PATH};
use super::{composite_id, join_path, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::{ProviderError, Result};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Declared phone attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhoneAssociationArgs {
    pub user_id: String,
    pub phone_id: String,
}

/// Phone attachment as kept in local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhoneAssociationState {
    /// `{user_id}-{phone_id}`
    pub id: String,
    #[serde(flatten)]
    pub args: UserPhoneAssociationArgs,
}

/// Manages phones attached to users.
pub struct UserPhoneAssociationHandler {
    caller: Arc<dyn SignedCaller>,
}

impl UserPhoneAssociationHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    async fn lookup(&self, args: &UserPhoneAssociationArgs) -> Result<UserPhoneAssociationState> {
        let UserPhoneAssociationArgs { user_id, phone_id } = args;

        let response = self
            .caller
            .signed_call(Method::GET, &user_path(user_id), &Params::new())
            .await?;

        let user: UserRecord =
            envelope::parse(&response, || format!("could not find user {}", user_id))?;

        if !user.phones.iter().any(|p| &p.phone_id == phone_id) {
            return Err(ProviderError::NotFound(format!(
                "phone {} attached to user {}",
                phone_id, user_id
            )));
        }

        Ok(UserPhoneAssociationState {
            id: composite_id(&user.user_id, phone_id),
            args: UserPhoneAssociationArgs {
                user_id: user.user_id,
                phone_id: phone_id.clone(),
            },
        })
    }
}

#[async_trait]
impl ResourceHandler for UserPhoneAssociationHandler {
    type Args = UserPhoneAssociationArgs;
    type State = UserPhoneAssociationState;

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("duo_user_phone_association")
            .with(AttributeSchema::required("user_id", AttributeType::String).force_new())
            .with(AttributeSchema::required("phone_id", AttributeType::String).force_new())
    }

    #[instrument(skip(self, args), fields(user_id = %args.user_id, phone_id = %args.phone_id))]
    async fn create(&self, args: &UserPhoneAssociationArgs) -> Result<UserPhoneAssociationState> {
        let params = ParamsBuilder::new().set("phone_id", &args.phone_id).build();
        let response = self
            .caller
            .signed_call(
                Method::POST,
                &join_path(USERS_PATH, &[args.user_id.as_str(), "phones"]),
                &params,
            )
            .await?;

        envelope::check(&response, || {
            format!(
                "could not associate phone {} to user {}",
                args.phone_id, args.user_id
            )
        })?;

        info!("Attached phone {} to user {}", args.phone_id, args.user_id);
        self.lookup(args).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &UserPhoneAssociationState) -> Result<UserPhoneAssociationState> {
        self.lookup(&state.args).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &UserPhoneAssociationState) -> Result<()> {
        let UserPhoneAssociationArgs { user_id, phone_id } = &state.args;

        let response = self
            .caller
            .signed_call(
                Method::DELETE,
                &join_path(USERS_PATH, &[user_id.as_str(), "phones", phone_id.as_str()]),
                &Params::new(),
            )
            .await?;

        envelope::check(&response, || {
            format!("could not disassociate phone {} from user {}", phone_id, user_id)
        })?;

        info!("Detached phone {} from user {}", phone_id, user_id);
        Ok(())
    }
}
