//! Shared fixtures for the session integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use anyhow::{bail, Result};
use pathway_core::{AuthConfig, MemoryStore, SessionManager, SessionRecord, SessionStore};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "x";

/// Unsigned JWT whose `exp` is `secs_from_now` seconds away
pub fn jwt_expiring_in(secs_from_now: i64) -> String {
    jwt_with_exp(Utc::now().timestamp() + secs_from_now)
}

pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "exp": exp, "token_type": "access", "jti": unique_jti() }).to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

fn unique_jti() -> String {
    format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

pub fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig::new(server.uri(), "test-secret")
}

pub fn manager_for(server: &MockServer, store: Arc<dyn SessionStore>) -> SessionManager {
    SessionManager::new(config_for(server), store).expect("manager should build")
}

/// Mount a token endpoint that accepts the test credentials and a profile
/// endpoint that answers for `access`.
pub async fn mount_sign_in(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/token/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": access, "refresh": refresh })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/me/"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "1", "email": EMAIL })),
        )
        .mount(server)
        .await;
}

/// In-memory store whose saves can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SessionStore for FlakyStore {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        self.inner.load(id)
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.save(record)
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.inner.remove(id)
    }
}
