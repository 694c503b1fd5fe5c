use axum::Json;
use common_auth::MaybeAuth;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// `GET /api/me`: who the bearer token says the caller is, if anyone.
pub async fn me(MaybeAuth(ctx): MaybeAuth) -> Json<MeResponse> {
    let body = match ctx {
        Some(ctx) => MeResponse {
            authenticated: true,
            username: Some(ctx.identity.principal),
            roles: Some(ctx.identity.roles),
        },
        None => MeResponse {
            authenticated: false,
            username: None,
            roles: None,
        },
    };
    Json(body)
}
