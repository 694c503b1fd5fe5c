#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use common_auth::test_support::{primary_key, Claims};
use common_auth::{JwtConfig, JwtVerifier};
use http_body_util::BodyExt;
use map_service::repo::InMemoryMapRepository;
use map_service::{build_router, AppState};
use serde_json::Value;
use tower::util::ServiceExt;

pub const KID: &str = "map-test-key";

/// Router over an in-memory store, trusting `primary_key()` under [`KID`].
pub fn app() -> Router {
    let verifier = JwtVerifier::builder(JwtConfig::new())
        .with_rsa_pem(KID, primary_key().public_pem.as_bytes())
        .expect("pem")
        .build()
        .expect("verifier");
    app_with(Arc::new(verifier))
}

pub fn app_with(verifier: Arc<JwtVerifier>) -> Router {
    let state = AppState::new(Arc::new(InMemoryMapRepository::new()), verifier);
    build_router(state)
}

/// Token for subject `sub` whose display name is `username`.
pub fn token(sub: &str, username: &str) -> String {
    primary_key().sign(KID, &Claims::valid(sub).username(username))
}

pub struct Reply {
    pub status: StatusCode,
    pub error_code: Option<String>,
    pub raw: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.raw).expect("json body")
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let error_code = response
        .headers()
        .get("X-Error-Code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let raw = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    Reply { status, error_code, raw }
}
