use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hirelink::credentials::{CredentialStore, FileBackend, SecondarySession};
use hirelink::gateway::{Gateway, LoginRedirect};
use hirelink::refresh::OAuthSessionProvider;

pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const TOKEN_PATH: &str = "/oauth/token";

/// Redirect hook that records each call.
#[derive(Debug, Default)]
pub struct RecordingRedirect {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self, entry_point: &str, reason: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((entry_point.to_string(), reason.to_string()));
    }
}

#[allow(dead_code)]
impl RecordingRedirect {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Store holding a primary access/refresh token pair.
#[allow(dead_code)]
pub fn primary_store(access: &str, refresh: &str) -> CredentialStore {
    let store = CredentialStore::in_memory();
    store.set_access_token(access).unwrap();
    store.set_refresh_token(refresh).unwrap();
    store
}

#[allow(dead_code)]
pub fn secondary_session(access: &str, refresh: &str) -> SecondarySession {
    SecondarySession {
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
        expires_at: None,
        token_type: "bearer".to_string(),
    }
}

/// Gateway against `server` with the OAuth secondary provider pointed at
/// the same server's `/oauth/token`.
pub fn gateway(
    server: &MockServer,
    store: CredentialStore,
    redirect: Arc<RecordingRedirect>,
) -> Gateway {
    let http = Arc::new(reqwest::Client::new());
    let provider = OAuthSessionProvider::new(
        Arc::clone(&http),
        Url::parse(&format!("{}{}", server.uri(), TOKEN_PATH)).unwrap(),
        None,
    );
    Gateway::builder(&server.uri())
        .unwrap()
        .store(store)
        .http_client(http)
        .refresh_path(REFRESH_PATH)
        .secondary_provider(Arc::new(provider))
        .login_redirect(redirect)
        .build()
        .unwrap()
}

/// Mounts `GET route`: `401` for `stale`, `200` with `body` for `fresh`.
#[allow(dead_code)]
pub async fn mount_resource(
    server: &MockServer,
    route: &str,
    auth_header: &str,
    stale: &str,
    fresh: &str,
    body: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header(auth_header, stale))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .and(header(auth_header, fresh))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn temp_file_store() -> (TempDir, CredentialStore) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let backend = FileBackend::open(dir.path().join("credentials.json"))
        .expect("failed to open credentials file");
    (dir, CredentialStore::new(Arc::new(backend)))
}
