use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

mod metrics;

pub use metrics::{http_error_metrics_layer, MAX_ERROR_CODES, OVERFLOW_CODE};

#[cfg(feature = "test-helpers")]
pub mod test_helpers {
    pub use crate::metrics::{distinct_gauge, overflow_count, simulate_error_code};
}

/// One rejected input field. `field` uses the wire name (`screenshots[2]`).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")] pub fields: Vec<FieldError>,
}

#[derive(Debug)]
pub enum ApiError {
    Forbidden { code: &'static str },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str },
    Conflict { code: &'static str, message: Option<String> },
    Validation { fields: Vec<FieldError> },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: Some(message.into()) } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code } }
    pub fn validation(fields: Vec<FieldError>) -> Self { Self::Validation { fields } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Forbidden { code }
            | ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code }
            | ApiError::Conflict { code, .. } => *code,
            ApiError::Validation { .. } => "validation_failed",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.status())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let body = match self {
            ApiError::Forbidden { code } | ApiError::NotFound { code } => {
                ErrorBody { code: code.into(), message: None, fields: Vec::new() }
            }
            ApiError::BadRequest { code, message } | ApiError::Conflict { code, message } => {
                ErrorBody { code: code.into(), message, fields: Vec::new() }
            }
            ApiError::Validation { fields } => ErrorBody {
                code: error_code.into(),
                message: Some("one or more fields are invalid".into()),
                fields,
            },
            // Internal detail stays in the server log.
            ApiError::Internal { .. } => {
                ErrorBody { code: error_code.into(), message: None, fields: Vec::new() }
            }
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
