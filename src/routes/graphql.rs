use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::post;
use axum::Router;

use crate::extractors::MaybeUser;
use crate::graphql::RequestContext;
use crate::state::AppState;

/// GraphQL endpoint handler. Anonymous callers are allowed; procedures that
/// need a caller check for one themselves.
async fn graphql_handler(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Json(req): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let request = req
        .data(state.db.clone())
        .data(state.source.clone())
        .data(RequestContext {
            mode: state.mode,
            viewer,
        });

    let response = state.graphql_schema.execute(request).await;
    Json(response)
}

/// GraphQL Playground UI (development tool)
async fn graphql_playground() -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/api/graphql")))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/graphql", post(graphql_handler).get(graphql_playground))
}
