use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Every reason a bearer token can be refused.
///
/// The variants exist for logs and tests only: the HTTP rendering is the
/// same generic 401 for all of them.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token uses unsupported alg '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("token missing kid header")]
    MissingKeyId,
    #[error("no decoding key registered for kid '{0}'")]
    UnknownKeyId(String),
    #[error("token alg '{token}' does not match key '{kid}' alg '{key}'")]
    AlgorithmMismatch {
        kid: String,
        token: String,
        key: String,
    },
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("token missing required claim '{0}'")]
    MissingClaim(&'static str),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS response contained no usable signing keys")]
    JwksEmpty,
    #[error("verifier misconfigured: {0}")]
    Configuration(String),
}

impl AuthError {
    /// True when the failure came from the key-set dependency rather than the token itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AuthError::JwksFetch(_) | AuthError::JwksDecode(_) | AuthError::JwksEmpty
        )
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::MissingRequiredClaim(claim) if claim == "exp" => {
                Self::MissingClaim("exp")
            }
            _ => Self::Verification(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: "Unauthorized",
        };
        let mut resp = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        resp.headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static("unauthorized"));
        resp
    }
}
