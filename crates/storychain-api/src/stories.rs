use anyhow::anyhow;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;

use storychain_types::api::{
    AddParagraphRequest, Claims, CreateStoryRequest, CreatedStoryResponse, StoryResponse,
    StorySummary,
};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::middleware;

pub async fn list_stories(
    State(state): State<AppState>,
) -> Result<Json<Vec<StorySummary>>, ApiError> {
    // Run the blocking scan off the async runtime
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_stories())
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(rows.iter().map(convert::story_summary).collect()))
}

pub async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<StoryResponse>, ApiError> {
    // Anonymous reads are allowed; a missing or invalid token just means
    // no viewer, never an error.
    let viewer = middleware::optional_viewer(&state, &headers).map(|c| c.sub.to_string());

    let db = state.clone();
    let story_id = id.to_string();
    let (story, paragraphs) = tokio::task::spawn_blocking(move || {
        let Some(story) = db.db.get_story(&story_id, viewer.as_deref())? else {
            return Ok((None, Vec::new()));
        };
        let paragraphs = db.db.get_story_paragraphs(&story_id, viewer.as_deref())?;
        Ok::<_, anyhow::Error>((Some(story), paragraphs))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    let story = story.ok_or_else(|| ApiError::NotFound("story not found".into()))?;
    Ok(Json(convert::story_response(&story, &paragraphs)))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim();
    let content = req.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation("title and content are required".into()));
    }

    let story_id = Uuid::new_v4();
    let paragraph_id = Uuid::new_v4();

    state.db.create_story(
        &story_id.to_string(),
        title,
        &claims.sub.to_string(),
        &paragraph_id.to_string(),
        content,
    )?;

    let story = state
        .db
        .get_story(&story_id.to_string(), None)?
        .ok_or_else(|| anyhow!("story missing right after insert"))?;
    let paragraph = state
        .db
        .get_paragraph(&paragraph_id.to_string(), None)?
        .ok_or_else(|| anyhow!("paragraph missing right after insert"))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedStoryResponse {
            id: story_id,
            title: story.title,
            created_at: convert::parse_timestamp(&story.created_at, "story"),
            first_paragraph: convert::paragraph_response(&paragraph),
        }),
    ))
}

pub async fn add_paragraph(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddParagraphRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("content is required".into()));
    }

    let story_id = id.to_string();
    if !state.db.story_exists(&story_id)? {
        return Err(ApiError::NotFound("story not found".into()));
    }

    let paragraph_id = Uuid::new_v4();
    state
        .db
        .insert_paragraph(&paragraph_id.to_string(), &story_id, &claims.sub.to_string(), content)?;

    // Re-read for the author username; a fresh paragraph has no votes and
    // the contributor has not voted on it.
    let paragraph = state
        .db
        .get_paragraph(&paragraph_id.to_string(), None)?
        .ok_or_else(|| anyhow!("paragraph missing right after insert"))?;

    Ok((StatusCode::CREATED, Json(convert::paragraph_response(&paragraph))))
}

pub async fn delete_story(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let story_id = id.to_string();
    let owner = state
        .db
        .story_owner(&story_id)?
        .ok_or_else(|| ApiError::NotFound("story not found".into()))?;

    if owner != claims.sub.to_string() {
        return Err(ApiError::Forbidden("not allowed to delete this story".into()));
    }

    state.db.delete_story(&story_id)?;
    Ok(Json(json!({ "message": "story deleted successfully" })))
}

pub async fn delete_paragraph(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let paragraph_id = id.to_string();
    let owner = state
        .db
        .paragraph_owner(&paragraph_id)?
        .ok_or_else(|| ApiError::NotFound("paragraph not found".into()))?;

    if owner != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "not allowed to delete this paragraph".into(),
        ));
    }

    state.db.delete_paragraph(&paragraph_id)?;
    Ok(Json(json!({ "message": "paragraph deleted successfully" })))
}
