use serde::Serialize;

use crate::claims::VerifiedClaims;
use crate::roles::DEFAULT_ROLES;

/// Who the caller is, as far as downstream authorization is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Display name used as the principal identifier.
    pub principal: String,
    /// Verified `sub` claim; stable across display-name changes.
    pub subject: String,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn from_claims(claims: &VerifiedClaims) -> Self {
        Self {
            principal: claims.display_name().to_owned(),
            subject: claims.subject.clone(),
            roles: DEFAULT_ROLES.iter().map(|role| role.to_string()).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }
}
