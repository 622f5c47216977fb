pub mod auth;
mod convert;
pub mod error;
pub mod middleware;
pub mod profiles;
pub mod stories;
pub mod votes;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware as axum_middleware};

/// Builds the full API router: public routes, token-gated routes, and a
/// JSON 404 fallback for unknown paths.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/stories", get(stories::list_stories))
        .route("/stories/{id}", get(stories::get_story))
        .route("/users/{username}", get(profiles::get_profile))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/stories", post(stories::create_story))
        .route("/stories/{id}/paragraphs", post(stories::add_paragraph))
        .route("/stories/{id}", delete(stories::delete_story))
        .route("/stories/paragraphs/{id}", delete(stories::delete_paragraph))
        .route("/votes/{id}", post(votes::toggle_story_vote))
        .route("/paragraph-votes/{id}", post(votes::toggle_paragraph_vote))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    public.merge(protected).fallback(not_found)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "route not found" })),
    )
}
