use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::models::{ContributionRow, ParagraphRow, StoryRow, StorySummaryRow, UserRow};

impl Database {
    // -- Users --

    /// Returns false when the username or email is already taken. The UNIQUE
    /// constraints are the real guard; callers that pre-check still have to
    /// handle this outcome for registrations racing past the pre-check.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?2)",
                (username, email),
                |row| row.get(0),
            )?;
            Ok(taken)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Stories --

    /// Creates a story together with its opening paragraph in one
    /// transaction; a story never exists without at least one paragraph.
    pub fn create_story(
        &self,
        story_id: &str,
        title: &str,
        user_id: &str,
        paragraph_id: &str,
        content: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO stories (id, title, user_id) VALUES (?1, ?2, ?3)",
                (story_id, title, user_id),
            )?;
            tx.execute(
                "INSERT INTO paragraphs (id, story_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                (paragraph_id, story_id, user_id, content),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_stories(&self) -> Result<Vec<StorySummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, u.username, s.created_at,
                        (SELECT COUNT(*) FROM story_votes v WHERE v.story_id = s.id) AS votes
                 FROM stories s
                 JOIN users u ON s.user_id = u.id
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )?;

            let rows = stmt
                .query_map([], map_story_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Fetches a story with its derived vote count and the viewer's vote
    /// flag in a single query. `viewer` is None for anonymous reads, which
    /// makes the EXISTS subquery match nothing.
    pub fn get_story(&self, id: &str, viewer: Option<&str>) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, s.user_id, u.username, s.created_at,
                        (SELECT COUNT(*) FROM story_votes v WHERE v.story_id = s.id) AS votes,
                        EXISTS (SELECT 1 FROM story_votes v
                                WHERE v.story_id = s.id AND v.user_id = ?2) AS user_has_voted
                 FROM stories s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.id = ?1",
            )?;

            let row = stmt
                .query_row((id, viewer), |row| {
                    Ok(StoryRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        user_id: row.get(2)?,
                        author: row.get(3)?,
                        created_at: row.get(4)?,
                        votes: row.get(5)?,
                        user_has_voted: row.get(6)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Paragraphs in chronological narrative order. created_at has second
    /// resolution, so rowid breaks ties between same-second inserts.
    pub fn get_story_paragraphs(
        &self,
        story_id: &str,
        viewer: Option<&str>,
    ) -> Result<Vec<ParagraphRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.story_id, p.user_id, u.username, p.content, p.created_at,
                        (SELECT COUNT(*) FROM paragraph_votes pv
                         WHERE pv.paragraph_id = p.id) AS votes,
                        EXISTS (SELECT 1 FROM paragraph_votes pv
                                WHERE pv.paragraph_id = p.id AND pv.user_id = ?2) AS user_has_voted
                 FROM paragraphs p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.story_id = ?1
                 ORDER BY p.created_at ASC, p.rowid ASC",
            )?;

            let rows = stmt
                .query_map((story_id, viewer), map_paragraph)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn story_owner(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let owner = conn
                .query_row("SELECT user_id FROM stories WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(owner)
        })
    }

    /// Cascade removes the story's paragraphs and every vote referencing
    /// either (foreign_keys=ON).
    pub fn delete_story(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM stories WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Paragraphs --

    pub fn story_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM stories WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn insert_paragraph(
        &self,
        id: &str,
        story_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO paragraphs (id, story_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                (id, story_id, user_id, content),
            )?;
            Ok(())
        })
    }

    pub fn get_paragraph(&self, id: &str, viewer: Option<&str>) -> Result<Option<ParagraphRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.story_id, p.user_id, u.username, p.content, p.created_at,
                        (SELECT COUNT(*) FROM paragraph_votes pv
                         WHERE pv.paragraph_id = p.id) AS votes,
                        EXISTS (SELECT 1 FROM paragraph_votes pv
                                WHERE pv.paragraph_id = p.id AND pv.user_id = ?2) AS user_has_voted
                 FROM paragraphs p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.id = ?1",
            )?;

            let row = stmt.query_row((id, viewer), map_paragraph).optional()?;
            Ok(row)
        })
    }

    pub fn paragraph_owner(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let owner = conn
                .query_row(
                    "SELECT user_id FROM paragraphs WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(owner)
        })
    }

    pub fn delete_paragraph(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM paragraphs WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Votes --

    /// Toggle a story vote. Returns None when the story does not exist,
    /// otherwise the resulting (votes, user_has_voted) pair.
    pub fn toggle_story_vote(&self, story_id: &str, user_id: &str) -> Result<Option<(i64, bool)>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM stories WHERE id = ?1)",
                [story_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let state = toggle_vote(&tx, "story_votes", "story_id", story_id, user_id)?;
            tx.commit()?;
            Ok(Some(state))
        })
    }

    /// Toggle a paragraph vote. Same contract as [`Self::toggle_story_vote`].
    pub fn toggle_paragraph_vote(
        &self,
        paragraph_id: &str,
        user_id: &str,
    ) -> Result<Option<(i64, bool)>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM paragraphs WHERE id = ?1)",
                [paragraph_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let state = toggle_vote(&tx, "paragraph_votes", "paragraph_id", paragraph_id, user_id)?;
            tx.commit()?;
            Ok(Some(state))
        })
    }

    // -- Profiles --

    pub fn get_user_stories(&self, user_id: &str) -> Result<Vec<StorySummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, u.username, s.created_at,
                        (SELECT COUNT(*) FROM story_votes v WHERE v.story_id = s.id) AS votes
                 FROM stories s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.user_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id], map_story_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_user_contributions(&self, user_id: &str) -> Result<Vec<ContributionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.story_id, s.title, p.content, p.created_at,
                        (SELECT COUNT(*) FROM paragraph_votes pv
                         WHERE pv.paragraph_id = p.id) AS votes
                 FROM paragraphs p
                 JOIN stories s ON p.story_id = s.id
                 WHERE p.user_id = ?1
                 ORDER BY p.created_at DESC, p.rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ContributionRow {
                        id: row.get(0)?,
                        story_id: row.get(1)?,
                        story_title: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                        votes: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// The toggle idiom: delete the ledger row first; insert only when nothing
/// was deleted. The caller wraps this in a transaction, so delete, insert
/// and the recount commit (or roll back) as one unit, and the composite
/// primary key makes a duplicate row impossible even under racing toggles.
fn toggle_vote(
    conn: &Connection,
    table: &str,
    target_col: &str,
    target_id: &str,
    user_id: &str,
) -> Result<(i64, bool)> {
    let removed = conn.execute(
        &format!("DELETE FROM {table} WHERE {target_col} = ?1 AND user_id = ?2"),
        (target_id, user_id),
    )?;

    if removed == 0 {
        conn.execute(
            &format!("INSERT INTO {table} ({target_col}, user_id) VALUES (?1, ?2)"),
            (target_id, user_id),
        )?;
    }

    let votes: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE {target_col} = ?1"),
        [target_id],
        |row| row.get(0),
    )?;
    let user_has_voted: bool = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE {target_col} = ?1 AND user_id = ?2)"
        ),
        (target_id, user_id),
        |row| row.get(0),
    )?;

    Ok((votes, user_has_voted))
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, email, password, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_story_summary(row: &rusqlite::Row<'_>) -> std::result::Result<StorySummaryRow, rusqlite::Error> {
    Ok(StorySummaryRow {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        created_at: row.get(3)?,
        votes: row.get(4)?,
    })
}

fn map_paragraph(row: &rusqlite::Row<'_>) -> std::result::Result<ParagraphRow, rusqlite::Error> {
    Ok(ParagraphRow {
        id: row.get(0)?,
        story_id: row.get(1)?,
        user_id: row.get(2)?,
        author: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        votes: row.get(6)?,
        user_has_voted: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, id: &str, username: &str) {
        assert!(
            db.create_user(id, username, &format!("{username}@example.com"), "hash")
                .unwrap()
        );
    }

    fn seed_story(db: &Database, story_id: &str, paragraph_id: &str, user_id: &str) {
        db.create_story(story_id, "A story", user_id, paragraph_id, "Once upon a time")
            .unwrap();
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn toggle_is_involution() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_user(&db, "u2", "bob");
        seed_story(&db, "s1", "p1", "u1");

        let (votes, has) = db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        assert_eq!((votes, has), (1, true));

        let (votes, has) = db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        assert_eq!((votes, has), (0, false));

        // Same pair again from scratch: the ledger holds exactly one row
        db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM story_votes"), 1);
    }

    #[test]
    fn vote_counts_are_derived_per_viewer() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_user(&db, "u2", "bob");
        seed_user(&db, "u3", "carol");
        seed_story(&db, "s1", "p1", "u1");

        db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        db.toggle_story_vote("s1", "u3").unwrap().unwrap();

        let story = db.get_story("s1", Some("u2")).unwrap().unwrap();
        assert_eq!(story.votes, 2);
        assert!(story.user_has_voted);

        let story = db.get_story("s1", Some("u1")).unwrap().unwrap();
        assert_eq!(story.votes, 2);
        assert!(!story.user_has_voted);

        // Anonymous viewer never has a vote
        let story = db.get_story("s1", None).unwrap().unwrap();
        assert_eq!(story.votes, 2);
        assert!(!story.user_has_voted);
    }

    #[test]
    fn toggle_missing_target_is_none() {
        let db = test_db();
        seed_user(&db, "u1", "alice");

        assert!(db.toggle_story_vote("nope", "u1").unwrap().is_none());
        assert!(db.toggle_paragraph_vote("nope", "u1").unwrap().is_none());
    }

    #[test]
    fn paragraph_votes_toggle_independently() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_user(&db, "u2", "bob");
        seed_story(&db, "s1", "p1", "u1");

        let (votes, has) = db.toggle_paragraph_vote("p1", "u2").unwrap().unwrap();
        assert_eq!((votes, has), (1, true));

        // The story ledger is untouched
        let story = db.get_story("s1", Some("u2")).unwrap().unwrap();
        assert_eq!(story.votes, 0);

        let (votes, has) = db.toggle_paragraph_vote("p1", "u2").unwrap().unwrap();
        assert_eq!((votes, has), (0, false));
    }

    #[test]
    fn deleting_story_cascades_to_paragraphs_and_votes() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_user(&db, "u2", "bob");
        seed_story(&db, "s1", "p1", "u1");
        db.insert_paragraph("p2", "s1", "u2", "and then").unwrap();

        db.toggle_story_vote("s1", "u2").unwrap().unwrap();
        db.toggle_paragraph_vote("p1", "u2").unwrap().unwrap();
        db.toggle_paragraph_vote("p2", "u1").unwrap().unwrap();

        db.delete_story("s1").unwrap();

        assert!(db.get_story("s1", None).unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM paragraphs"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM story_votes"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM paragraph_votes"), 0);
    }

    #[test]
    fn deleting_paragraph_cascades_to_its_votes() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_story(&db, "s1", "p1", "u1");
        db.insert_paragraph("p2", "s1", "u1", "more").unwrap();

        db.toggle_paragraph_vote("p2", "u1").unwrap().unwrap();
        db.delete_paragraph("p2").unwrap();

        assert_eq!(count(&db, "SELECT COUNT(*) FROM paragraph_votes"), 0);
        // The sibling paragraph survives
        assert!(db.get_paragraph("p1", None).unwrap().is_some());
    }

    #[test]
    fn duplicate_username_or_email_is_rejected() {
        let db = test_db();
        seed_user(&db, "u1", "alice");

        assert!(!db.create_user("u2", "alice", "other@example.com", "hash").unwrap());
        assert!(!db.create_user("u3", "alice2", "alice@example.com", "hash").unwrap());
        assert!(db.username_or_email_taken("alice", "nobody@example.com").unwrap());
        assert!(!db.username_or_email_taken("carol", "carol@example.com").unwrap());

        // The original account is untouched
        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.id, "u1");
    }

    #[test]
    fn paragraphs_come_back_in_insertion_order() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_story(&db, "s1", "p1", "u1");
        db.insert_paragraph("p2", "s1", "u1", "second").unwrap();
        db.insert_paragraph("p3", "s1", "u1", "third").unwrap();

        let paragraphs = db.get_story_paragraphs("s1", None).unwrap();
        let ids: Vec<&str> = paragraphs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2", "p3"]);
    }

    #[test]
    fn profile_queries_scope_to_the_user() {
        let db = test_db();
        seed_user(&db, "u1", "alice");
        seed_user(&db, "u2", "bob");
        seed_story(&db, "s1", "p1", "u1");
        seed_story(&db, "s2", "p2", "u2");
        db.insert_paragraph("p3", "s2", "u1", "alice contributes").unwrap();
        db.toggle_paragraph_vote("p3", "u2").unwrap().unwrap();

        let stories = db.get_user_stories("u1").unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, "s1");
        assert_eq!(stories[0].author, "alice");

        let contributions = db.get_user_contributions("u1").unwrap();
        let ids: Vec<&str> = contributions.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["p3", "p1"]);
        assert_eq!(contributions[0].story_title, "A story");
        assert_eq!(contributions[0].votes, 1);
    }
}
