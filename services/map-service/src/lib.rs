pub mod app;
pub mod app_state;
pub mod config;
pub mod map;
pub mod map_handlers;
pub mod me_handlers;
pub mod metrics;
pub mod repo;
pub mod validation;

pub use app::build_router;
pub use app_state::AppState;
pub use common_http_errors::ApiError;
