use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use storychain_types::api::{Claims, VoteState};

use crate::auth::AppState;
use crate::error::ApiError;

/// Toggle the caller's vote on a story. The response always replaces the
/// client's state wholesale with the post-toggle count and flag.
pub async fn toggle_story_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<VoteState>, ApiError> {
    let (votes, user_has_voted) = state
        .db
        .toggle_story_vote(&id.to_string(), &claims.sub.to_string())?
        .ok_or_else(|| ApiError::NotFound("story not found".into()))?;

    Ok(Json(VoteState {
        votes,
        user_has_voted,
    }))
}

/// Toggle the caller's vote on a paragraph.
pub async fn toggle_paragraph_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<VoteState>, ApiError> {
    let (votes, user_has_voted) = state
        .db
        .toggle_paragraph_vote(&id.to_string(), &claims.sub.to_string())?
        .ok_or_else(|| ApiError::NotFound("paragraph not found".into()))?;

    Ok(Json(VoteState {
        votes,
        user_has_voted,
    }))
}
