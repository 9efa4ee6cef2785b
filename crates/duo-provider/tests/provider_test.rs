//! Integration tests for entity resources and the plugin session.

mod common;

use common::{fail, mock_duo_server, ok, test_env, test_provider};
use duo_provider::protocol::{Response, Session};
use duo_provider::PlannedChange;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

fn user(username: &str, realname: &str) -> serde_json::Value {
    json!({
        "user_id": "DU123",
        "username": username,
        "realname": realname,
        "email": "",
        "firstname": "",
        "lastname": "",
        "status": "active",
        "notes": "",
        "is_enrolled": false,
        "last_login": null,
        "created": 1489612729,
        "phones": [],
        "groups": []
    })
}

#[tokio::test]
async fn test_user_create_then_read_is_consistent() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/v1/users"))
        .and(body_string_contains("username=jdoe"))
        .and(body_string_contains("realname=Jane%20Doe"))
        .respond_with(ok(user("jdoe", "Jane Doe")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/v1/users/DU123"))
        .respond_with(ok(user("jdoe", "Jane Doe")))
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    let declared = json!({"username": "jdoe", "realname": "Jane Doe"});

    let state = provider.create("duo_user", declared.clone()).await.unwrap();
    assert_eq!(state["id"], "DU123");
    assert_eq!(state["username"], "jdoe");
    assert_eq!(state["realname"], "Jane Doe");

    let refreshed = provider.read("duo_user", state.clone()).await.unwrap();
    assert_eq!(refreshed, Some(state.clone()));

    assert_eq!(
        provider.plan("duo_user", Some(&state), Some(&declared)).unwrap(),
        PlannedChange::NoOp
    );
}

#[tokio::test]
async fn test_fail_envelope_surfaces_message() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("POST"))
        .and(path("/admin/v1/users"))
        .respond_with(fail(400, 40003, "Duplicate resource"))
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    let err = provider
        .create("duo_user", json!({"username": "jdoe"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "api");
    assert!(err.to_string().contains("Duplicate resource"));
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/v1/users/DU123"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    let err = provider
        .read("duo_user", json!({"id": "DU123", "username": "jdoe"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn test_deleted_entity_reads_as_absent() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/v1/integrations/DIRWIH0ZZPV4G88B37VQ"))
        .respond_with(ok(json!("")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/v1/integrations/DIRWIH0ZZPV4G88B37VQ"))
        .respond_with(fail(404, 40401, "Resource not found"))
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    let state = json!({
        "id": "DIRWIH0ZZPV4G88B37VQ",
        "name": "Ops Admin API",
        "type": "adminapi",
        "secret_key": "QO4ZLqQVRIOZYkHfdPDORfcNf8LeXIbCWwHazY7o"
    });

    provider.delete("duo_integration", state.clone()).await.unwrap();
    assert_eq!(provider.read("duo_integration", state).await.unwrap(), None);
}

#[tokio::test]
async fn test_apply_replaces_phone_on_type_change() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/v1/phones/DP1"))
        .respond_with(ok(json!("")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let replacement = json!({
        "phone_id": "DP2",
        "number": "+15555550100",
        "type": "Landline",
        "platform": "Unknown",
        "activated": false,
        "sms_passcodes_sent": false,
        "capabilities": ["phone"]
    });

    Mock::given(method("POST"))
        .and(path("/admin/v1/phones"))
        .and(body_string_contains("type=landline"))
        .respond_with(ok(replacement.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/v1/phones/DP2"))
        .respond_with(ok(replacement))
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    let prior = json!({"id": "DP1", "number": "+15555550100", "type": "mobile"});
    let planned = json!({"number": "+15555550100", "type": "landline"});

    assert_eq!(
        provider.plan("duo_phone", Some(&prior), Some(&planned)).unwrap(),
        PlannedChange::Replace {
            fields: vec!["type"]
        }
    );

    let state = provider
        .apply("duo_phone", Some(prior), Some(planned))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state["id"], "DP2");
    assert_eq!(state["type"], "landline");
}

#[tokio::test]
async fn test_skey_in_configuration_fails_before_any_call() {
    let mock_server = mock_duo_server().await;
    let mut session = Session::new(test_env(&mock_server));

    let response = session
        .handle_line(&json!({"op": "configure", "config": {"skey": "leaked"}}).to_string())
        .await;

    assert!(matches!(response, Response::Error { ref kind, .. } if kind == "configuration"));
    assert!(!session.is_configured());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_round_trip_over_signed_client() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/v1/admins/allowed_auth_methods"))
        .respond_with(ok(json!({
            "push_enabled": true,
            "sms_enabled": false,
            "voice_enabled": false,
            "mobile_otp_enabled": true,
            "hardware_token_enabled": false,
            "yubikey_enabled": false,
            "webauthn_enabled": true,
            "verified_push_enabled": true,
            "verified_push_length": 6
        })))
        .mount(&mock_server)
        .await;

    let mut session = Session::new(test_env(&mock_server));
    let configured = session
        .handle_line(r#"{"op": "configure", "config": {}}"#)
        .await;
    assert!(matches!(configured, Response::Ok { .. }));

    let response = session
        .handle_line(
            &json!({
                "op": "read",
                "resource_type": "duo_admin_auth_factors",
                "state": {"id": "allowed_auth_methods"}
            })
            .to_string(),
        )
        .await;

    match response {
        Response::Ok { result } => {
            assert_eq!(result["id"], "allowed_auth_methods");
            assert_eq!(result["webauthn_enabled"], true);
            assert_eq!(result["sms_enabled"], false);
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn test_admin_delete() {
    let mock_server = mock_duo_server().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/v1/admins/DE1"))
        .respond_with(ok(json!("")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = test_provider(&mock_server);
    provider
        .delete(
            "duo_admin",
            json!({"id": "DE1", "email": "ops@example.com", "name": "Ops"}),
        )
        .await
        .unwrap();
}
