use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

/// Distinct `code` label values tracked before new codes collapse into [`OVERFLOW_CODE`].
pub const MAX_ERROR_CODES: usize = 40;
pub const OVERFLOW_CODE: &str = "overflow";

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "http_errors_total",
            "Count of HTTP error responses emitted (status >= 400)",
        ),
        &["service", "code", "status"],
    )
    .expect("http_errors_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

static ERROR_CODES_DISTINCT: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new(
        "http_error_codes_distinct",
        "Distinct X-Error-Code values recorded as metric labels",
    )
    .expect("http_error_codes_distinct");
    let _ = prometheus::default_registry().register(Box::new(g.clone()));
    g
});

static ERROR_CODE_OVERFLOW: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "http_error_code_overflow_total",
        "Error responses whose code was folded into the overflow label",
    )
    .expect("http_error_code_overflow_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Label value to record for `code`, admitting it to the seen set while there is room.
fn label_for(code: &str) -> String {
    let mut seen = SEEN_CODES.lock().unwrap_or_else(PoisonError::into_inner);
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() >= MAX_ERROR_CODES {
        ERROR_CODE_OVERFLOW.inc();
        return OVERFLOW_CODE.to_string();
    }
    seen.insert(code.to_string());
    ERROR_CODES_DISTINCT.set(seen.len() as i64);
    code.to_string()
}

fn record(service: &str, code: &str, status: &str) {
    let label = label_for(code);
    HTTP_ERRORS_TOTAL
        .with_label_values(&[service, &label, status])
        .inc();
}

pub type ErrorMetricsFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware for `axum::middleware::from_fn` counting every response with
/// status >= 400 by its `X-Error-Code` header.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request, Next) -> ErrorMetricsFuture + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.as_u16() >= 400 {
                let code = resp
                    .headers()
                    .get("X-Error-Code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                record(service, code, status.as_str());
            }
            resp
        })
    }
}

#[cfg(feature = "test-helpers")]
pub fn simulate_error_code(code: &str) {
    record("test-helpers", code, "400");
}

#[cfg(feature = "test-helpers")]
pub fn distinct_gauge() -> i64 {
    ERROR_CODES_DISTINCT.get()
}

#[cfg(feature = "test-helpers")]
pub fn overflow_count() -> u64 {
    ERROR_CODE_OVERFLOW.get()
}
