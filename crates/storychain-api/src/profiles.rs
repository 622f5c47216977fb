use anyhow::anyhow;
use axum::Json;
use axum::extract::{Path, State};

use storychain_types::api::ProfileResponse;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;

/// Public profile: the user's record plus their stories and the paragraphs
/// they contributed to other stories, newest first.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let db = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let Some(user) = db.db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        let stories = db.db.get_user_stories(&user.id)?;
        let contributions = db.db.get_user_contributions(&user.id)?;
        Ok::<_, anyhow::Error>(Some((user, stories, contributions)))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    let (user, stories, contributions) =
        result.ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(ProfileResponse {
        user: convert::user_response(&user),
        stories: stories.iter().map(convert::story_summary).collect(),
        contributions: contributions
            .iter()
            .map(convert::contribution_response)
            .collect(),
    }))
}
