//! Registry of resource handlers and change planning.

use crate::error::{ProviderError, Result};
use crate::resources::{
    AdminAuthFactorsHandler, AdminHandler, DynResource, IntegrationHandler, PhoneHandler,
    UserGroupAssociationHandler, UserHandler, UserPhoneAssociationHandler,
};
use crate::schema::ResourceSchema;
use duo_api_client::SignedCaller;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What applying a declaration to prior state would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedChange {
    NoOp,
    Create,
    Update { changed: Vec<&'static str> },
    Replace { fields: Vec<&'static str> },
    Delete,
}

/// All resource types backed by one signed caller.
pub struct Provider {
    resources: HashMap<&'static str, Arc<dyn DynResource>>,
}

impl Provider {
    pub fn new(caller: Arc<dyn SignedCaller>) -> Self {
        let handlers: Vec<Arc<dyn DynResource>> = vec![
            Arc::new(AdminHandler::new(caller.clone())),
            Arc::new(AdminAuthFactorsHandler::new(caller.clone())),
            Arc::new(IntegrationHandler::new(caller.clone())),
            Arc::new(PhoneHandler::new(caller.clone())),
            Arc::new(UserHandler::new(caller.clone())),
            Arc::new(UserGroupAssociationHandler::new(caller.clone())),
            Arc::new(UserPhoneAssociationHandler::new(caller)),
        ];

        let resources = handlers
            .into_iter()
            .map(|handler| (handler.schema().type_name, handler))
            .collect();

        Self { resources }
    }

    /// Registered type names, sorted.
    pub fn resource_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.resources.keys().copied().collect();
        types.sort_unstable();
        types
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn DynResource>> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnsupportedResource(type_name.to_string()))
    }

    pub fn schema(&self, type_name: &str) -> Result<ResourceSchema> {
        Ok(self.resource(type_name)?.schema())
    }

    pub fn schemas(&self) -> Vec<ResourceSchema> {
        self.resource_types()
            .into_iter()
            .filter_map(|name| self.resources.get(name).map(|r| r.schema()))
            .collect()
    }

    /// Compare prior state with a new declaration. `None` means absent.
    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&Value>,
        planned: Option<&Value>,
    ) -> Result<PlannedChange> {
        let schema = self.schema(type_name)?;

        let change = match (prior, planned) {
            (None, None) => PlannedChange::NoOp,
            (Some(_), None) => PlannedChange::Delete,
            (None, Some(planned)) => {
                schema.validate(planned)?;
                PlannedChange::Create
            }
            (Some(prior), Some(planned)) => {
                schema.validate(planned)?;
                let changed = schema.changed_attributes(prior, planned);
                let fields = schema.replacement_fields(&changed);
                if !fields.is_empty() {
                    PlannedChange::Replace { fields }
                } else if changed.is_empty() {
                    PlannedChange::NoOp
                } else {
                    PlannedChange::Update { changed }
                }
            }
        };

        debug!("Planned {} change: {:?}", type_name, change);
        Ok(change)
    }

    pub async fn create(&self, type_name: &str, args: Value) -> Result<Value> {
        self.resource(type_name)?.create_json(args).await
    }

    /// Refresh state. A resource that no longer exists remotely is `None`.
    ///
    /// Only [`ProviderError::NotFound`] means absent. Other failures, such as
    /// a failed parent lookup, are returned as errors.
    pub async fn read(&self, type_name: &str, state: Value) -> Result<Option<Value>> {
        match self.resource(type_name)?.read_json(state).await {
            Ok(state) => Ok(Some(state)),
            Err(ProviderError::NotFound(what)) => {
                info!("{} no longer exists", what);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update(&self, type_name: &str, prior: Value, args: Value) -> Result<Value> {
        self.resource(type_name)?.update_json(prior, args).await
    }

    pub async fn delete(&self, type_name: &str, state: Value) -> Result<()> {
        self.resource(type_name)?.delete_json(state).await
    }

    /// Plan and carry out the change. Replacement deletes before creating.
    #[instrument(skip(self, prior, planned))]
    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<Value>,
        planned: Option<Value>,
    ) -> Result<Option<Value>> {
        let change = self.plan(type_name, prior.as_ref(), planned.as_ref())?;

        match (change, prior, planned) {
            (PlannedChange::NoOp, prior, _) => Ok(prior),
            (PlannedChange::Create, _, Some(planned)) => {
                self.create(type_name, planned).await.map(Some)
            }
            (PlannedChange::Update { .. }, Some(prior), Some(planned)) => {
                self.update(type_name, prior, planned).await.map(Some)
            }
            (PlannedChange::Replace { fields }, Some(prior), Some(planned)) => {
                info!("Replacing {} ({} changed)", type_name, fields.join(", "));
                self.delete(type_name, prior).await?;
                self.create(type_name, planned).await.map(Some)
            }
            (PlannedChange::Delete, Some(prior), _) => {
                self.delete(type_name, prior).await.map(|_| None)
            }
            (change, _, _) => Err(ProviderError::invalid(
                type_name,
                format!("inconsistent plan {:?}", change),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{ok, MockCaller};
    use duo_api_client::Method;
    use serde_json::json;

    fn provider(caller: MockCaller) -> Provider {
        Provider::new(Arc::new(caller))
    }

    fn user_record(username: &str) -> Value {
        json!({
            "user_id": "DU123",
            "username": username,
            "realname": "",
            "status": "active",
            "is_enrolled": false,
            "phones": []
        })
    }

    #[test]
    fn test_registers_every_resource_type() {
        let provider = provider(MockCaller::new());
        assert_eq!(
            provider.resource_types(),
            vec![
                "duo_admin",
                "duo_admin_auth_factors",
                "duo_integration",
                "duo_phone",
                "duo_user",
                "duo_user_group_association",
                "duo_user_phone_association",
            ]
        );
        assert_eq!(provider.schemas().len(), 7);
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let provider = provider(MockCaller::new());
        let err = provider.schema("duo_group").unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedResource(ref t) if t == "duo_group"));
    }

    #[test]
    fn test_plan_actions() {
        let provider = provider(MockCaller::new());
        let prior = json!({"id": "DU1", "username": "jdoe", "status": "active", "is_enrolled": false});

        assert_eq!(
            provider.plan("duo_user", None, Some(&json!({"username": "jdoe"}))).unwrap(),
            PlannedChange::Create
        );
        assert_eq!(
            provider.plan("duo_user", Some(&prior), None).unwrap(),
            PlannedChange::Delete
        );
        assert_eq!(
            provider.plan("duo_user", Some(&prior), Some(&json!({"username": "jdoe"}))).unwrap(),
            PlannedChange::NoOp
        );
        assert_eq!(
            provider
                .plan("duo_user", Some(&prior), Some(&json!({"username": "jane"})))
                .unwrap(),
            PlannedChange::Update {
                changed: vec!["username"]
            }
        );
    }

    #[test]
    fn test_plan_force_new_field_replaces() {
        let provider = provider(MockCaller::new());
        let prior = json!({"id": "U1-G1", "user_id": "U1", "group_id": "G1"});
        let planned = json!({"user_id": "U1", "group_id": "G2"});

        assert_eq!(
            provider
                .plan("duo_user_group_association", Some(&prior), Some(&planned))
                .unwrap(),
            PlannedChange::Replace {
                fields: vec!["group_id"]
            }
        );
    }

    #[test]
    fn test_plan_rejects_invalid_declaration() {
        let provider = provider(MockCaller::new());
        let err = provider
            .plan("duo_user", None, Some(&json!({"realname": "No Username"})))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidAttributes { .. }));
    }

    #[tokio::test]
    async fn test_apply_update_in_place() {
        let mut caller = MockCaller::new();
        caller
            .expect_signed_call()
            .withf(|method, path, params| {
                *method == Method::POST && path == "/admin/v1/users/DU123" && params["username"] == "jane"
            })
            .times(1)
            .returning(|_, _, _| Ok(ok(json!(""))));
        caller
            .expect_signed_call()
            .withf(|method, _, _| *method == Method::GET)
            .times(1)
            .returning(|_, _, _| Ok(ok(user_record("jane"))));

        let provider = provider(caller);
        let prior = json!({"id": "DU123", "username": "jdoe", "status": "active", "is_enrolled": false});
        let state = provider
            .apply("duo_user", Some(prior), Some(json!({"username": "jane"})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state["id"], "DU123");
        assert_eq!(state["username"], "jane");
    }

    #[tokio::test]
    async fn test_update_of_force_new_field_is_rejected() {
        let provider = provider(MockCaller::new());
        let prior = json!({"id": "DP1", "number": "+15555550100", "type": "mobile"});
        let err = provider
            .update("duo_phone", prior, json!({"number": "+15555550100", "type": "landline"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("changing type requires replacement"));
    }

    #[tokio::test]
    async fn test_apply_noop_makes_no_calls() {
        let provider = provider(MockCaller::new());
        let prior = json!({"id": "U1-G1", "user_id": "U1", "group_id": "G1"});
        let state = provider
            .apply(
                "duo_user_group_association",
                Some(prior.clone()),
                Some(json!({"user_id": "U1", "group_id": "G1"})),
            )
            .await
            .unwrap();
        assert_eq!(state, Some(prior));
    }

    #[tokio::test]
    async fn test_read_not_found_is_absent() {
        let mut caller = MockCaller::new();
        caller.expect_signed_call().returning(|_, _, _| {
            Ok(crate::resources::testing::fail(404, 40401, "Resource not found"))
        });

        let provider = provider(caller);
        let state = provider
            .read("duo_user", json!({"id": "DU404", "username": "gone"}))
            .await
            .unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_integration_with_remote_defaults_settles() {
        let record = json!({
            "integration_key": "DIRWIH0ZZPV4G88B37VQ",
            "secret_key": "QO4ZLqQVRIOZYkHfdPDORfcNf8LeXIbCWwHazY7o",
            "name": "Ops",
            "type": "adminapi",
            "notes": "",
            "greeting": "",
            "adminapi_admins": 0,
            "adminapi_info": 1,
            "adminapi_integrations": 0,
            "adminapi_read_log": 0,
            "adminapi_read_resource": 0,
            "adminapi_settings": 0,
            "adminapi_write_resource": 0,
            "self_service_allowed": false,
            "username_normalization_policy": "None"
        });

        let mut caller = MockCaller::new();
        let created = record.clone();
        caller
            .expect_signed_call()
            .withf(|method, _, _| *method == Method::POST)
            .times(1)
            .returning(move |_, _, _| Ok(ok(created.clone())));
        caller
            .expect_signed_call()
            .withf(|method, _, _| *method == Method::GET)
            .times(1)
            .returning(move |_, _, _| Ok(ok(record.clone())));

        let provider = provider(caller);
        let declared = json!({"name": "Ops", "type": "adminapi"});
        let state = provider
            .create("duo_integration", declared.clone())
            .await
            .unwrap();

        assert_eq!(state["username_normalization_policy"], "None");
        assert_eq!(
            provider
                .plan("duo_integration", Some(&state), Some(&declared))
                .unwrap(),
            PlannedChange::NoOp
        );
    }
}
