use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified JWT claims.
///
/// Provider-specific fields are read leniently: a claim of the wrong JSON type
/// is treated as absent rather than failing the whole token.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedClaims {
    pub subject: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl VerifiedClaims {
    /// Name shown for the caller: username, then full name, then email, then subject.
    pub fn display_name(&self) -> &str {
        [&self.username, &self.full_name, &self.email]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|value| !value.is_empty())
            .unwrap_or(self.subject.as_str())
    }
}

fn string_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |node, key| node.get(key))
        .and_then(Value::as_str)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl TryFrom<Value> for VerifiedClaims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        if !value.is_object() {
            return Err(AuthError::InvalidJson("claims are not a JSON object".into()));
        }

        let subject = string_at(&value, &["sub"])
            .filter(|sub| !sub.is_empty())
            .map(str::to_owned)
            .ok_or(AuthError::MissingClaim("sub"))?;

        let expires_at = match value.get("exp").and_then(Value::as_i64) {
            Some(exp) => Some(
                Utc.timestamp_opt(exp, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("exp", exp.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            username: non_empty(string_at(&value, &["user_metadata", "username"])),
            full_name: non_empty(string_at(&value, &["user_metadata", "full_name"])),
            email: non_empty(string_at(&value, &["email"])),
            issuer: string_at(&value, &["iss"]).map(str::to_owned),
            subject,
            expires_at,
            raw: value,
        })
    }
}
