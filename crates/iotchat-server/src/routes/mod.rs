pub mod health;
pub mod reply;

use crate::state::AppState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// All routes with a permissive CORS layer for the browser client
pub fn configure(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(reply::routes(state))
        .merge(health::routes())
        .layer(cors)
}
