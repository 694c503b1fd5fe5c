use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::verifier::JwtVerifier;

/// Authenticated caller. Rejects with 401 when the request carries no usable
/// bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
}

impl AuthContext {
    pub fn principal(&self) -> &str {
        &self.identity.principal
    }

    pub fn subject(&self) -> &str {
        &self.identity.subject
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.identity.has_role(role)
    }
}

/// Optional authentication.
///
/// `None` when the request does not attempt bearer authentication; a request
/// that attempts it and fails is rejected with 401 rather than downgraded to
/// anonymous.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<AuthContext>);

impl MaybeAuth {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref().map(|ctx| &ctx.identity)
    }
}

fn header_str(value: Option<&HeaderValue>) -> AuthResult<Option<&str>> {
    match value {
        None => Ok(None),
        Some(value) => match value.to_str() {
            Ok(raw) => Ok(Some(raw)),
            // Opaque bytes after a bearer prefix still count as an attempt.
            Err(_) if value.as_bytes().starts_with(b"Bearer ") => {
                Err(AuthError::InvalidAuthorization)
            }
            Err(_) => Ok(None),
        },
    }
}

async fn authenticate(parts: &Parts, verifier: &JwtVerifier) -> AuthResult<Option<AuthContext>> {
    let header = header_str(parts.headers.get(AUTHORIZATION))?;
    let identity = verifier.authenticate(header).await.inspect_err(|err| {
        if err.is_upstream() {
            warn!(error = %err, "bearer authentication failed: key set unavailable");
        } else {
            warn!(error = %err, "bearer authentication failed");
        }
    })?;
    Ok(identity.map(|identity| AuthContext { identity }))
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        authenticate(parts, &verifier).await.map(MaybeAuth)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        authenticate(parts, &verifier)
            .await?
            .ok_or(AuthError::MissingAuthorization)
    }
}
