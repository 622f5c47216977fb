use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and the
/// verification middleware. Canonical definition lives here in
/// storychain-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// -- Stories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStoryRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddParagraphRequest {
    pub content: String,
}

/// Story as it appears in list views and profiles: vote count only,
/// no per-viewer flag.
#[derive(Debug, Serialize)]
pub struct StorySummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub votes: i64,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub votes: i64,
    #[serde(rename = "userHasVoted")]
    pub user_has_voted: bool,
    pub paragraphs: Vec<ParagraphResponse>,
}

#[derive(Debug, Serialize)]
pub struct ParagraphResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub user_id: Uuid,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub votes: i64,
    #[serde(rename = "userHasVoted")]
    pub user_has_voted: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedStoryResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "firstParagraph")]
    pub first_paragraph: ParagraphResponse,
}

// -- Votes --

/// The full post-toggle state. Mutating vote endpoints always return this
/// pair rather than a delta so the client's view never drifts from the
/// ledger.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteState {
    pub votes: i64,
    #[serde(rename = "userHasVoted")]
    pub user_has_voted: bool,
}

// -- Profiles --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub stories: Vec<StorySummary>,
    pub contributions: Vec<ContributionResponse>,
}

/// A paragraph the user contributed to someone's story, carrying enough
/// of the parent story to link back to it.
#[derive(Debug, Serialize)]
pub struct ContributionResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub story_title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub votes: i64,
}
