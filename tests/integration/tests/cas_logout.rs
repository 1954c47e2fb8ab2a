//! Single logout through the CAS server.

use kc_protocol_cas::events::{errors, EventType};
use kc_protocol_cas::session::UserSessionState;
use reqwest::StatusCode;

use crate::common::{location, query_value, success_xml, TestEnv, ALIAS, REALM};

async fn start_logout(env: &TestEnv, session_id: &str) -> reqwest::Response {
    env.client
        .get(env.url(&format!(
            "/realms/{REALM}/broker/{ALIAS}/logout?session={session_id}"
        )))
        .send()
        .await
        .unwrap()
}

fn logout_response_url(env: &TestEnv, state: &str) -> String {
    env.url(&format!(
        "/realms/{REALM}/broker/{ALIAS}/endpoint/logout_response?state={state}"
    ))
}

#[tokio::test]
async fn logout_round_trip() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env.login("ST-1", &success_xml("alice", &[])).await.unwrap();

    let response = start_logout(&env, &session_id).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cas_logout = location(&response).unwrap();
    assert_eq!(cas_logout.path(), "/cas/logout");
    let service = query_value(&cas_logout, "service").unwrap();
    assert_eq!(service, logout_response_url(&env, &session_id));
    assert_eq!(
        env.state.broker.session(&session_id).unwrap().state,
        UserSessionState::LoggingOut
    );

    // CAS sends the browser back to the service.
    let response = env.client.get(&service).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).unwrap().path(),
        format!("/realms/{REALM}/logged-out")
    );
    assert!(env.state.broker.session(&session_id).is_none());

    let events = env.state.broker.events();
    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::Logout);
    assert!(!last.is_error());
}

#[tokio::test]
async fn logout_response_is_single_use() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env.login("ST-1", &success_xml("alice", &[])).await.unwrap();
    start_logout(&env, &session_id).await;
    let url = logout_response_url(&env, &session_id);

    let first = env.client.get(&url).send().await.unwrap();
    let second = env.client.get(&url).send().await.unwrap();

    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert!(env.state.broker.session(&session_id).is_none());
}

#[tokio::test]
async fn duplicate_logout_state_is_rejected_with_event() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env.login("ST-1", &success_xml("alice", &[])).await.unwrap();
    start_logout(&env, &session_id).await;

    let response = env
        .client
        .get(format!("{}&state=other", logout_response_url(&env, &session_id)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("Unexpected error when authenticating with identity provider"));
    assert_eq!(
        env.state.broker.session(&session_id).unwrap().state,
        UserSessionState::LoggingOut
    );
    let last = env.state.broker.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::LogoutError);
}

#[tokio::test]
async fn logout_response_for_active_session_is_rejected() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env.login("ST-1", &success_xml("alice", &[])).await.unwrap();

    let response = env
        .client
        .get(logout_response_url(&env, &session_id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        env.state.broker.session(&session_id).unwrap().state,
        UserSessionState::Active
    );
    let last = env.state.broker.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::LogoutError);
    assert_eq!(last.error.as_deref(), Some(errors::USER_SESSION_NOT_FOUND));
}

#[tokio::test]
async fn logout_response_for_unknown_session_is_rejected() {
    let env = TestEnv::new().await.unwrap();

    let response = env
        .client
        .get(logout_response_url(&env, "unknown"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("Unexpected error when authenticating with identity provider"));
}

#[tokio::test]
async fn logout_of_unknown_session_is_rejected() {
    let env = TestEnv::new().await.unwrap();

    let response = start_logout(&env, "unknown").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        env.state.broker.events()[0].error.as_deref(),
        Some(errors::USER_SESSION_NOT_FOUND)
    );
}

#[tokio::test]
async fn logged_out_session_has_no_token() {
    let env = TestEnv::new().await.unwrap();
    let session_id = env.login("ST-1", &success_xml("alice", &[])).await.unwrap();
    start_logout(&env, &session_id).await;
    env.client
        .get(logout_response_url(&env, &session_id))
        .send()
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

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
