use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::response::ApiResponse;
use crate::{articles, comments, taxonomy, users};

/// Builds the full API. Static upload serving, CORS and tracing are layered
/// on by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/articles", get(articles::list))
        .route("/articles/{slug}", get(articles::get))
        .route("/articles/{slug}/comments", get(comments::list))
        .route("/categories", get(taxonomy::categories))
        .route("/tags", get(taxonomy::tags));

    let protected_routes = Router::new()
        .route("/user", get(users::me).put(users::update_me))
        .route("/articles", post(articles::create))
        .route("/articles/my-articles", get(articles::mine))
        .route(
            "/articles/{slug}",
            put(articles::update).delete(articles::delete),
        )
        .route("/articles/{slug}/comments", post(comments::create))
        .route(
            "/articles/{slug}/comments/{id}",
            put(comments::update).delete(comments::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> ApiResponse<Value> {
    ApiResponse::ok("OK", json!({ "status": "ok" }))
}
