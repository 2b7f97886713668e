//! Gateway refresh integration tests
//!
//! Drives the full gateway (call wrapper, coordinator, resolver and
//! teardown) against a `wiremock` server standing in for both the API and
//! the secondary provider's token endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hirelink::credentials::{ActiveCredential, CredentialStore};
use hirelink::gateway::Gateway;
use hirelink::{GatewayError, RefreshError};

use common::{
    gateway, mount_resource, primary_store, secondary_session, RecordingRedirect, REFRESH_PATH,
    TOKEN_PATH,
};

async fn mount_primary_refresh(server: &MockServer, delay: Duration, expected: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(serde_json::json!({
                    "accessToken": "T2",
                    "refreshToken": "R2"
                })),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn refresh_failure(err: &anyhow::Error) -> Arc<RefreshError> {
    match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::RefreshFailed(shared)) => Arc::clone(shared),
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Single flight
// ---------------------------------------------------------------------------

/// Three calls expire together: one refresh, three replays with `Bearer T2`,
/// each returning its own response.
#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::from_millis(300), 1).await;
    for (route, body) in [
        ("/jobs", serde_json::json!({"resource": "jobs"})),
        ("/cvs", serde_json::json!({"resource": "cvs"})),
        ("/organizations/me", serde_json::json!({"resource": "org"})),
    ] {
        mount_resource(&server, route, "authorization", "Bearer T1", "Bearer T2", body).await;
    }

    let redirect = Arc::new(RecordingRedirect::default());
    let store = primary_store("T1", "R1");
    let gateway = gateway(&server, store.clone(), redirect.clone());

    let results: Vec<serde_json::Value> = join_all(
        ["/jobs", "/cvs", "/organizations/me"]
            .into_iter()
            .map(|route| gateway.get_json::<serde_json::Value>(route)),
    )
    .await
    .into_iter()
    .map(|r| r.expect("call should succeed after refresh"))
    .collect();

    assert_eq!(results[0]["resource"], "jobs");
    assert_eq!(results[1]["resource"], "cvs");
    assert_eq!(results[2]["resource"], "org");

    assert_eq!(gateway.coordinator().cycles_started(), 1);
    assert_eq!(store.access_token().unwrap().as_deref(), Some("T2"));
    assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R2"));
    assert_eq!(redirect.count(), 0);
}

/// Many concurrent callers on one path still cause a single refresh request.
#[tokio::test]
async fn test_many_concurrent_callers_one_refresh_request() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::from_millis(300), 1).await;
    mount_resource(
        &server,
        "/jobs",
        "authorization",
        "Bearer T1",
        "Bearer T2",
        serde_json::json!([]),
    )
    .await;

    let gateway = gateway(
        &server,
        primary_store("T1", "R1"),
        Arc::new(RecordingRedirect::default()),
    );

    let responses = join_all((0..10).map(|_| gateway.get("/jobs"))).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), 200);
    }
    let refreshes = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == REFRESH_PATH)
        .count();
    assert_eq!(refreshes, 1);
}

/// Clones of a gateway share one coordinator.
#[tokio::test]
async fn test_cloned_gateways_share_refresh() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::from_millis(300), 1).await;
    mount_resource(
        &server,
        "/jobs",
        "authorization",
        "Bearer T1",
        "Bearer T2",
        serde_json::json!([]),
    )
    .await;

    let first = gateway(
        &server,
        primary_store("T1", "R1"),
        Arc::new(RecordingRedirect::default()),
    );
    let second = first.clone();

    let (a, b) = tokio::join!(first.get("/jobs"), second.get("/jobs"));

    assert_eq!(a.unwrap().status(), 200);
    assert_eq!(b.unwrap().status(), 200);
    assert_eq!(second.coordinator().cycles_started(), 1);
}

// ---------------------------------------------------------------------------
// Provider fallback
// ---------------------------------------------------------------------------

/// No refresh token, refreshable secondary session: the secondary header is
/// used afterwards and the session survives.
#[tokio::test]
async fn test_secondary_fallback_without_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "S2",
            "refresh_token": "SR2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_resource(
        &server,
        "/jobs",
        "x-identity-token",
        "S1",
        "S2",
        serde_json::json!({"ok": true}),
    )
    .await;

    let store = CredentialStore::in_memory();
    store
        .set_secondary_session(&secondary_session("S1", "SR1"))
        .unwrap();
    let redirect = Arc::new(RecordingRedirect::default());
    let gateway = gateway(&server, store.clone(), redirect.clone());

    let first: serde_json::Value = gateway.get_json("/jobs").await.unwrap();
    assert_eq!(first["ok"], true);

    // Later calls go out with the renewed secondary token directly.
    let second = gateway.get("/jobs").await.unwrap();
    assert_eq!(second.status(), 200);

    let session = store.secondary_session().unwrap().unwrap();
    assert_eq!(session.access_token, "S2");
    assert_eq!(session.refresh_token.as_deref(), Some("SR2"));
    assert_eq!(gateway.coordinator().cycles_started(), 1);
    assert_eq!(redirect.count(), 0);
}

/// A successful primary refresh never contacts the secondary provider.
#[tokio::test]
async fn test_primary_success_skips_secondary() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::ZERO, 1).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_resource(
        &server,
        "/jobs",
        "authorization",
        "Bearer T1",
        "Bearer T2",
        serde_json::json!([]),
    )
    .await;

    let store = primary_store("T1", "R1");
    store
        .set_secondary_session(&secondary_session("S1", "SR1"))
        .unwrap();
    let gateway = gateway(&server, store, Arc::new(RecordingRedirect::default()));

    assert_eq!(gateway.get("/jobs").await.unwrap().status(), 200);
}

/// Primary refresh rejected, secondary renews: the call succeeds with the
/// secondary header, and later calls keep using it without another refresh.
#[tokio::test]
async fn test_primary_failure_falls_back_to_secondary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "S2"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_resource(
        &server,
        "/jobs",
        "authorization",
        "Bearer T1",
        "Bearer never",
        serde_json::json!([]),
    )
    .await;
    mount_resource(
        &server,
        "/jobs",
        "x-identity-token",
        "S1",
        "S2",
        serde_json::json!(["from-secondary"]),
    )
    .await;

    let store = primary_store("T1", "R1");
    store
        .set_secondary_session(&secondary_session("S1", "SR1"))
        .unwrap();
    let redirect = Arc::new(RecordingRedirect::default());
    let gateway = gateway(&server, store.clone(), redirect.clone());

    let jobs: Vec<String> = gateway.get_json("/jobs").await.unwrap();
    assert_eq!(jobs, vec!["from-secondary"]);

    assert_eq!(
        store.active_credential().unwrap(),
        Some(ActiveCredential::Secondary("S2".to_string()))
    );

    let again: Vec<String> = gateway.get_json("/jobs").await.unwrap();
    assert_eq!(again, vec!["from-secondary"]);

    assert_eq!(gateway.coordinator().cycles_started(), 1);
    // T1 once, then S2 for the replay and the second call.
    let resource_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/jobs")
        .count();
    assert_eq!(resource_calls, 3);
    assert_eq!(redirect.count(), 0);
}

/// An access token without a refresh token: the secondary session takes
/// over after one refresh and stays in use.
#[tokio::test]
async fn test_secondary_takes_over_from_unrefreshable_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "S2"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cvs"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cvs"))
        .and(header("x-identity-token", "S2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(3)
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    store.set_access_token("T1").unwrap();
    store
        .set_secondary_session(&secondary_session("S1", "SR1"))
        .unwrap();
    let gateway = gateway(&server, store, Arc::new(RecordingRedirect::default()));

    for _ in 0..3 {
        assert_eq!(gateway.get("/cvs").await.unwrap().status(), 200);
    }
    assert_eq!(gateway.coordinator().cycles_started(), 1);
}

// ---------------------------------------------------------------------------
// Terminal failure
// ---------------------------------------------------------------------------

/// Both refreshes fail: every waiter gets the same error, the store is
/// cleared, teardown runs once, and later calls make no refresh requests.
#[tokio::test]
async fn test_total_failure_tears_down_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_delay(Duration::from_millis(300))
                .set_body_string("revoked"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = primary_store("T1", "R1");
    store
        .set_secondary_session(&secondary_session("S1", "SR1"))
        .unwrap();
    let redirect = Arc::new(RecordingRedirect::default());
    let gateway = gateway(&server, store.clone(), redirect.clone());

    let errors: Vec<Arc<RefreshError>> = join_all(
        ["/jobs", "/cvs", "/organizations/me"]
            .into_iter()
            .map(|route| gateway.get(route)),
    )
    .await
    .into_iter()
    .map(|r| refresh_failure(&r.expect_err("call should fail")))
    .collect();

    assert!(Arc::ptr_eq(&errors[0], &errors[1]));
    assert!(Arc::ptr_eq(&errors[1], &errors[2]));
    match errors[0].as_ref() {
        RefreshError::Exhausted { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].strategy, "primary");
            assert_eq!(attempts[1].strategy, "secondary");
        }
        other => panic!("unexpected refresh error: {other:?}"),
    }

    assert!(store.is_empty().unwrap());
    assert_eq!(gateway.coordinator().teardowns(), 1);
    assert_eq!(redirect.count(), 1);
    assert_eq!(redirect.calls.lock().unwrap()[0].0, "/login");

    // Signed out: a further 401 finds nothing to refresh with and makes no
    // refresh request (the mocks' expectations above would fail otherwise).
    let err = gateway.get("/jobs").await.unwrap_err();
    match refresh_failure(&err).as_ref() {
        RefreshError::Exhausted { attempts } => {
            assert!(attempts
                .iter()
                .all(|a| matches!(a.outcome, hirelink::refresh::StrategyOutcome::Unavailable(_))));
        }
        other => panic!("unexpected refresh error: {other:?}"),
    }
}

/// A call rejected again after a successful refresh is terminal and is not
/// retried a second time.
#[tokio::test]
async fn test_second_401_after_refresh_is_terminal() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::ZERO, 1).await;
    Mock::given(method("GET"))
        .and(path("/admin/reports"))
        .respond_with(ResponseTemplate::new(401).set_body_string("account disabled"))
        .expect(2)
        .mount(&server)
        .await;

    let redirect = Arc::new(RecordingRedirect::default());
    let store = primary_store("T1", "R1");
    let gateway = gateway(&server, store.clone(), redirect.clone());

    let err = gateway.get("/admin/reports").await.unwrap_err();

    match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::Unauthorized { status, body }) => {
            assert_eq!(*status, 401);
            assert_eq!(body, "account disabled");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    assert_eq!(gateway.coordinator().cycles_started(), 1);
    assert_eq!(redirect.count(), 0);
    assert_eq!(store.access_token().unwrap().as_deref(), Some("T2"));
}

/// An opt-in refresh bound turns a hanging refresh into a total failure.
#[tokio::test]
async fn test_refresh_timeout_is_total_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = primary_store("T1", "R1");
    let redirect = Arc::new(RecordingRedirect::default());
    let gateway = Gateway::builder(&server.uri())
        .unwrap()
        .store(store.clone())
        .refresh_path(REFRESH_PATH)
        .refresh_timeout(Some(Duration::from_millis(100)))
        .login_redirect(redirect.clone())
        .build()
        .unwrap();

    let err = gateway.get("/jobs").await.unwrap_err();

    assert!(matches!(
        refresh_failure(&err).as_ref(),
        RefreshError::TimedOut { .. }
    ));
    assert!(store.is_empty().unwrap());
    assert_eq!(redirect.count(), 1);
}

// ---------------------------------------------------------------------------
// Pass-through
// ---------------------------------------------------------------------------

/// Network failures reach the caller unchanged and never refresh.
#[tokio::test]
async fn test_network_error_passes_through() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let gateway = Gateway::builder(&uri)
        .unwrap()
        .store(primary_store("T1", "R1"))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let err = gateway.get("/jobs").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::Transport(_))
    ));
    assert_eq!(gateway.coordinator().cycles_started(), 0);
}

/// Separately built gateways never share refresh state.
#[tokio::test]
async fn test_independent_gateways_refresh_independently() {
    let server = MockServer::start().await;
    mount_primary_refresh(&server, Duration::ZERO, 2).await;
    mount_resource(
        &server,
        "/jobs",
        "authorization",
        "Bearer T1",
        "Bearer T2",
        serde_json::json!([]),
    )
    .await;

    let a = gateway(
        &server,
        primary_store("T1", "R1"),
        Arc::new(RecordingRedirect::default()),
    );
    let b = gateway(
        &server,
        primary_store("T1", "R1"),
        Arc::new(RecordingRedirect::default()),
    );

    assert_eq!(a.get("/jobs").await.unwrap().status(), 200);
    assert_eq!(b.get("/jobs").await.unwrap().status(), 200);
    assert_eq!(a.coordinator().cycles_started(), 1);
    assert_eq!(b.coordinator().cycles_started(), 1);
}
