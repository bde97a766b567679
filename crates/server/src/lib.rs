pub mod admin;
pub mod api;
pub mod bootstrap;
pub mod health;
pub mod service;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::services::ServeDir;

pub use service::RequestService;

/// JSON API, admin page and static assets on one router.
pub fn app_router(service: Arc<RequestService>, static_dir: &Path) -> Router {
    api::router(service.clone())
        .merge(admin::router(service))
        .nest_service("/static", ServeDir::new(static_dir))
}
