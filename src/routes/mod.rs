pub mod auth;
pub mod graphql;
pub mod invite;
pub mod upload;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The complete HTTP surface.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(graphql::router())
        .merge(auth::router())
        .merge(invite::router())
        .merge(upload::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
