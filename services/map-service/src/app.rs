use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common_http_errors::http_error_metrics_layer;

use crate::app_state::AppState;
use crate::map_handlers::{create_map, delete_map, get_map, list_maps, reveal_code, update_map};
use crate::me_handlers::me;
use crate::metrics::render_metrics;

pub const SERVICE_NAME: &str = "map-service";

async fn health() -> &'static str {
    "ok"
}

/// Every route of the service, with error metrics applied. CORS is layered on in `main`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .route("/api/me", get(me))
        .route("/api/maps", get(list_maps).post(create_map))
        .route(
            "/api/maps/:slug",
            get(get_map).put(update_map).delete(delete_map),
        )
        .route("/api/maps/:slug/reveal", post(reveal_code))
        .with_state(state)
        .layer(middleware::from_fn(http_error_metrics_layer(SERVICE_NAME)))
}
