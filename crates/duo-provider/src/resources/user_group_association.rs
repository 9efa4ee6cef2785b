//! `duo_user_group_association` resource.
//!
//! Membership has no remote identity of its own. It exists exactly when the
//! group's member list contains the user.

use super::user::USERS_PATH;
use super::{composite_id, join_path, ParamsBuilder, ResourceHandler};
use crate::envelope;
use crate::error::{ProviderError, Result};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};
use async_trait::async_trait;
use duo_api_client::{Method, Params, SignedCaller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const GROUPS_PATH: &str = "/admin/v1/groups";

/// Declared membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupAssociationArgs {
    pub user_id: String,
    pub group_id: String,
}

/// Membership as kept in local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupAssociationState {
    /// `{user_id}-{group_id}`
    pub id: String,
    #[serde(flatten)]
    pub args: UserGroupAssociationArgs,
}

#[derive(Debug, Deserialize)]
struct GroupMember {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupRecord {
    #[serde(default)]
    users: Vec<GroupMember>,
}

/// Manages user membership of groups.
pub struct UserGroupAssociationHandler {
    caller: Arc<dyn SignedCaller>,
}

impl UserGroupAssociationHandler {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        Self { caller }
    }

    /// Scan the group's members for the user.
    ///
    /// A failed group lookup is reported as an error naming the group, never
    /// as a missing membership.
    async fn lookup(&self, args: &UserGroupAssociationArgs) -> Result<UserGroupAssociationState> {
        let UserGroupAssociationArgs { user_id, group_id } = args;

        let response = self
            .caller
            .signed_call(
                Method::GET,
                &join_path(GROUPS_PATH, &[group_id.as_str()]),
                &Params::new(),
            )
            .await?;

        let group: GroupRecord =
            envelope::parse(&response, || format!("could not find group {}", group_id))?;

        debug!("Group {} has {} members", group_id, group.users.len());

        let member = group
            .users
            .into_iter()
            .find(|m| &m.user_id == user_id)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("group {} attached to user {}", group_id, user_id))
            })?;

        Ok(UserGroupAssociationState {
            id: composite_id(&member.user_id, group_id),
            args: UserGroupAssociationArgs {
                user_id: member.user_id,
                group_id: group_id.clone(),
            },
        })
    }
}

#[async_trait]
impl ResourceHandler for UserGroupAssociationHandler {
    type Args = UserGroupAssociationArgs;
    type State = UserGroupAssociationState;

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("duo_user_group_association")
            .with(AttributeSchema::required("user_id", AttributeType::String).force_new())
            .with(AttributeSchema::required("group_id", AttributeType::String).force_new())
    }

    #[instrument(skip(self, args), fields(user_id = %args.user_id, group_id = %args.group_id))]
    async fn create(&self, args: &UserGroupAssociationArgs) -> Result<UserGroupAssociationState> {
        let params = ParamsBuilder::new().set("group_id", &args.group_id).build();
        let response = self
            .caller
            .signed_call(
                Method::POST,
                &join_path(USERS_PATH, &[args.user_id.as_str(), "groups"]),
                &params,
            )
            .await?;

        envelope::check(&response, || {
            format!(
                "could not associate group {} to user {}",
                args.group_id, args.user_id
            )
        })?;

        info!("Added user {} to group {}", args.user_id, args.group_id);
        self.lookup(args).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &UserGroupAssociationState) -> Result<UserGroupAssociationState> {
        self.lookup(&state.args).await
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &UserGroupAssociationState) -> Result<()> {
        let UserGroupAssociationArgs { user_id, group_id } = &state.args;

        let response = self
            .caller
            .signed_call(
                Method::DELETE,
                &join_path(USERS_PATH, &[user_id.as_str(), "groups", group_id.as_str()]),
                &Params::new(),
            )
            .await?;

        envelope::check(&response, || {
            format!("could not disassociate group {} from user {}", group_id, user_id)
        })?;

        info!("Removed user {} from group {}", user_id, group_id);
        Ok(())
    }
}
