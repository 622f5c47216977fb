/// Row types mapping directly to SQLite rows. Distinct from the
/// storychain-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct StoryRow {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub author: String,
    pub created_at: String,
    pub votes: i64,
    pub user_has_voted: bool,
}

pub struct StorySummaryRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub created_at: String,
    pub votes: i64,
}

pub struct ParagraphRow {
    pub id: String,
    pub story_id: String,
    pub user_id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
    pub votes: i64,
    pub user_has_voted: bool,
}

pub struct ContributionRow {
    pub id: String,
    pub story_id: String,
    pub story_title: String,
    pub content: String,
    pub created_at: String,
    pub votes: i64,
}
