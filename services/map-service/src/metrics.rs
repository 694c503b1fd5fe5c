use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, TextEncoder};

pub static MAP_CODE_REVEALS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "map_code_reveals_total",
        "Total map access codes disclosed",
    )
    .expect("map_code_reveals_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

/// Text exposition of the default registry (shared with `common-http-errors`).
pub async fn render_metrics() -> Result<String, StatusCode> {
    Lazy::force(&MAP_CODE_REVEALS);
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
