use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::comment::Comment;
use crate::domain::user::AuthorRef;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, post_id: i64, author_id: i64, text: String) -> Result<Comment> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.db.pool())
        .await?;

        let row = sqlx::query(
            "SELECT c.id, c.post_id, c.text, c.created, u.id AS author_id, \
                    u.username, u.first_name, u.last_name \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.id = ?",
        )
        .bind(id)
        .fetch_one(self.db.pool())
        .await?;

        comment_from_row(&row)
    }

    /// Comments on a post, oldest first.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.text, c.created, u.id AS author_id, \
                    u.username, u.first_name, u.last_name \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? \
             ORDER BY c.id ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(comment_from_row).collect()
    }

    pub async fn count_for_post(&self, post_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    let first_name: String = row.try_get("first_name")?;
    let last_name: String = row.try_get("last_name")?;
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author: AuthorRef::new(
            row.try_get("author_id")?,
            row.try_get("username")?,
            &first_name,
            &last_name,
        ),
        text: row.try_get("text")?,
        created: row.try_get("created")?,
    })
}
