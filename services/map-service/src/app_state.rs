use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::JwtVerifier;

use crate::repo::MapRepository;

/// Shared application state used by handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn MapRepository>,
    pub jwt_verifier: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(repo: Arc<dyn MapRepository>, jwt_verifier: Arc<JwtVerifier>) -> Self {
        Self { repo, jwt_verifier }
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}
