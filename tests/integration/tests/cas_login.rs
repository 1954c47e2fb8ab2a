//! Brokered login against the fake CAS server.

use httpmock::prelude::*;
use kc_protocol_cas::events::{errors, EventType};
use kc_protocol_cas::mapper::{keys, AttributeToRoleMapper, MapperConfig, UserAttributeMapper};
use kc_protocol_cas::session::UserSessionState;
use kc_protocol_cas::ProtocolVariant;
use reqwest::StatusCode;

use crate::common::{failure_xml, location, query_value, success_xml, TestEnv, ALIAS, REALM};

const GENERIC_ERROR: &str = "Unexpected error when authenticating with identity provider";

#[tokio::test]
async fn login_redirects_to_cas_with_state_bound_service() {
    let env = TestEnv::new().await.unwrap();

    let login = env.start_login(None).await.unwrap();

    assert_eq!(login.path(), "/cas/login");
    assert!(login.query_pairs().all(|(k, _)| k != "renew" && k != "gateway"));

    let service = url::Url::parse(&query_value(&login, "service").unwrap()).unwrap();
    assert_eq!(
        service.path(),
        format!("/realms/{REALM}/broker/{ALIAS}/endpoint")
    );
    let state = query_value(&service, "state").unwrap();
    assert_eq!(state.len(), 43);
    assert_eq!(env.state.broker.pending_count(), 1);
}

#[tokio::test]
async fn each_login_gets_a_fresh_state() {
    let env = TestEnv::new().await.unwrap();

    let first = env.start_login(None).await.unwrap();
    let second = env.start_login(None).await.unwrap();

    assert_ne!(
        query_value(&first, "service").unwrap(),
        query_value(&second, "service").unwrap()
    );
}

#[tokio::test]
async fn successful_login_opens_session() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(Some("/app")).await.unwrap();
    let service = query_value(&login, "service").unwrap();

    let mock = env
        .cas
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cas/p3/serviceValidate")
                .query_param("ticket", "ST-1-abc")
                .query_param("service", service.as_str());
            then.status(200)
                .header("content-type", "application/xml")
                .body(success_xml("alice", &[("mail", "alice@example.org")]));
        })
        .await;

    let response = env.return_with_ticket(&service, "ST-1-abc").await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let next = location(&response).unwrap();
    assert_eq!(next.path(), "/app");

    let session_id = query_value(&next, "session_state").unwrap();
    let session = env.state.broker.session(&session_id).unwrap();
    assert_eq!(session.username, "alice");
    assert_eq!(session.state, UserSessionState::Active);
    assert_eq!(env.state.broker.pending_count(), 0);

    let events = env.state.broker.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Login);
    assert_eq!(events[0].user_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();
    let mock = env.cas_validates("ST-1", &success_xml("alice", &[])).await;

    let first = env.return_with_ticket(&service, "ST-1").await.unwrap();
    let second = env.return_with_ticket(&service, "ST-1").await.unwrap();

    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(second.status(), StatusCode::EXPECTATION_FAILED);
    mock.assert_async().await;
}

#[tokio::test]
async fn forged_state_never_logs_in() {
    let env = TestEnv::new().await.unwrap();
    env.start_login(None).await.unwrap();
    let _mock = env.cas_validates("ST-1", &success_xml("mallory", &[])).await;

    let forged = env.url(&format!(
        "/realms/{REALM}/broker/{ALIAS}/endpoint?state=forged"
    ));
    let response = env.return_with_ticket(&forged, "ST-1").await.unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    assert!(env.state.broker.federated_user("mallory").is_none());
    assert_eq!(env.state.broker.pending_count(), 1);

    let events = env.state.broker.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::LoginError);
    assert_eq!(
        events[0].error.as_deref(),
        Some(errors::IDENTITY_PROVIDER_LOGIN_FAILURE)
    );
}

#[tokio::test]
async fn duplicate_state_shows_generic_page() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();
    let mock = env.cas_validates("ST-1", &success_xml("alice", &[])).await;

    let mut url = url::Url::parse(&service).unwrap();
    url.query_pairs_mut()
        .append_pair("state", "other")
        .append_pair("ticket", "ST-1");
    let response = env.client.get(url).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    let body = response.text().await.unwrap();
    assert!(body.contains(GENERIC_ERROR));
    assert!(!body.contains("duplicate"));
    assert_eq!(mock.calls_async().await, 0);
    assert_eq!(env.state.broker.pending_count(), 1);

    let events = env.state.broker.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::LoginError);
    assert_eq!(
        events[0].error.as_deref(),
        Some(errors::IDENTITY_PROVIDER_LOGIN_FAILURE)
    );
}

#[tokio::test]
async fn cas_rejection_shows_generic_page() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();
    let _mock = env
        .cas_validates("ST-bad", &failure_xml("INVALID_TICKET", "Ticket ST-bad not recognized"))
        .await;

    let response = env.return_with_ticket(&service, "ST-bad").await.unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    let body = response.text().await.unwrap();
    assert!(body.contains(GENERIC_ERROR));
    assert!(!body.contains("INVALID_TICKET"));
    assert!(!body.contains("ST-bad"));

    let events = env.state.broker.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::LoginError);
}

#[tokio::test]
async fn missing_ticket_fails() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();

    let response = env.client.get(&service).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    assert_eq!(env.state.broker.events()[0].event_type, EventType::LoginError);
}

#[tokio::test]
async fn cas_server_error_fails() {
    let env = TestEnv::new().await.unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();
    let _mock = env
        .cas
        .mock_async(|when, then| {
            when.method(GET).path("/cas/p3/serviceValidate");
            then.status(500).body("internal error");
        })
        .await;

    let response = env.return_with_ticket(&service, "ST-1").await.unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    assert!(env.state.broker.federated_user("alice").is_none());
}

#[tokio::test]
async fn flags_are_sent_to_cas() {
    let env = TestEnv::with_config(|config| {
        config.cas.renew = true;
        config.cas.gateway = true;
    })
    .await
    .unwrap();

    let login = env.start_login(None).await.unwrap();

    assert_eq!(query_value(&login, "renew").unwrap(), "true");
    assert_eq!(query_value(&login, "gateway").unwrap(), "true");
}

#[tokio::test]
async fn legacy_variant_validates_without_p3() {
    let env = TestEnv::with_config(|config| {
        config.cas.protocol_variant = ProtocolVariant::Legacy;
    })
    .await
    .unwrap();
    let login = env.start_login(None).await.unwrap();
    let service = query_value(&login, "service").unwrap();
    let mock = env
        .cas
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cas/serviceValidate")
                .query_param("ticket", "ST-2");
            then.status(200)
                .header("content-type", "text/xml")
                .body(success_xml("bob", &[]));
        })
        .await;

    let response = env.return_with_ticket(&service, "ST-2").await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(env.state.broker.federated_user("bob").is_some());
}

#[tokio::test]
async fn mappers_shape_the_local_user() {
    let env = TestEnv::with_config(|config| {
        config.cas.trust_email = true;
        config.cas.mappers = vec![
            MapperConfig::new("email", UserAttributeMapper::ID)
                .with_config(keys::ATTRIBUTE, "mail")
                .with_config(keys::USER_ATTRIBUTE, "email"),
            MapperConfig::new("department", UserAttributeMapper::ID)
                .with_config(keys::ATTRIBUTE, "department")
                .with_config(keys::USER_ATTRIBUTE, "department"),
            MapperConfig::new("staff", AttributeToRoleMapper::ID)
                .with_config(keys::ATTRIBUTE, "affiliation")
                .with_config(keys::ATTRIBUTE_VALUE, "staff")
                .with_config(keys::ROLE, "employee"),
        ];
    })
    .await
    .unwrap();

    env.login(
        "ST-1",
        &success_xml(
            "alice",
            &[
                ("mail", "alice@example.org"),
                ("department", "physics"),
                ("affiliation", "staff"),
            ],
        ),
    )
    .await
    .unwrap();

    let user = env.state.broker.federated_user("alice").unwrap().user;
    assert_eq!(user.email.as_deref(), Some("alice@example.org"));
    assert!(user.email_verified);
    assert_eq!(user.attributes["department"], vec!["physics"]);
    assert!(user.roles.contains("employee"));

    env.login(
        "ST-2",
        &success_xml("alice", &[("affiliation", "alumni")]),
    )
    .await
    .unwrap();

    let user = env.state.broker.federated_user("alice").unwrap().user;
    assert_eq!(user.email.as_deref(), Some("alice@example.org"));
    assert_eq!(user.attributes["department"], vec!["physics"]);
    assert!(!user.roles.contains("employee"));
}

#[tokio::test]
async fn token_endpoint_returns_cas_response() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env
        .login("ST-1", &success_xml("alice", &[("mail", "alice@example.org")]))
        .await
        .unwrap();

    let response = env
        .client
        .get(env.url(&format!(
            "/realms/{REALM}/broker/{ALIAS}/token?session={session_id}"
        )))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let token: serde_json::Value = response.json().await.unwrap();
    assert_eq!(token["user"], "alice");
    assert_eq!(token["attributes"]["mail"][0], "alice@example.org");
}

#[tokio::test]
async fn unknown_provider_is_not_found() {
    let env = TestEnv::new().await.unwrap();

    let response = env
        .client
        .get(env.url(&format!("/realms/{REALM}/broker/other/login")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
