/// Role granted to every caller holding a verified token.
pub const ROLE_USER: &str = "ROLE_USER";

pub const DEFAULT_ROLES: &[&str] = &[ROLE_USER];
