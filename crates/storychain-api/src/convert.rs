//! Row-to-response shaping. SQLite hands back uuids and timestamps as TEXT;
//! rows that fail to parse are logged and substituted with defaults rather
//! than failing the whole read.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use storychain_db::models::{ContributionRow, ParagraphRow, StoryRow, StorySummaryRow, UserRow};
use storychain_types::api::{
    ContributionResponse, ParagraphResponse, StoryResponse, StorySummary, UserResponse,
};

pub(crate) fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{raw}' on {context}: {e}");
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') is "YYYY-MM-DD HH:MM:SS" without a
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{raw}' on {context}: {e}");
            DateTime::default()
        })
}

pub(crate) fn user_response(row: &UserRow) -> UserResponse {
    UserResponse {
        id: parse_uuid(&row.id, "user"),
        username: row.username.clone(),
        email: row.email.clone(),
        created_at: parse_timestamp(&row.created_at, "user"),
    }
}

pub(crate) fn story_summary(row: &StorySummaryRow) -> StorySummary {
    StorySummary {
        id: parse_uuid(&row.id, "story"),
        title: row.title.clone(),
        author: row.author.clone(),
        created_at: parse_timestamp(&row.created_at, "story"),
        votes: row.votes,
    }
}

pub(crate) fn paragraph_response(row: &ParagraphRow) -> ParagraphResponse {
    ParagraphResponse {
        id: parse_uuid(&row.id, "paragraph"),
        story_id: parse_uuid(&row.story_id, "paragraph"),
        user_id: parse_uuid(&row.user_id, "paragraph"),
        author: row.author.clone(),
        content: row.content.clone(),
        created_at: parse_timestamp(&row.created_at, "paragraph"),
        votes: row.votes,
        user_has_voted: row.user_has_voted,
    }
}

pub(crate) fn story_response(row: &StoryRow, paragraphs: &[ParagraphRow]) -> StoryResponse {
    StoryResponse {
        id: parse_uuid(&row.id, "story"),
        title: row.title.clone(),
        user_id: parse_uuid(&row.user_id, "story"),
        author: row.author.clone(),
        created_at: parse_timestamp(&row.created_at, "story"),
        votes: row.votes,
        user_has_voted: row.user_has_voted,
        paragraphs: paragraphs.iter().map(paragraph_response).collect(),
    }
}

pub(crate) fn contribution_response(row: &ContributionRow) -> ContributionResponse {
    ContributionResponse {
        id: parse_uuid(&row.id, "paragraph"),
        story_id: parse_uuid(&row.story_id, "paragraph"),
        story_title: row.story_title.clone(),
        content: row.content.clone(),
        created_at: parse_timestamp(&row.created_at, "paragraph"),
        votes: row.votes,
    }
}
