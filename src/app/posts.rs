use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::app::paginator::{Page, PageWindow, Paginator};
use crate::domain::group::GroupRef;
use crate::domain::post::{Post, PostFilter};
use crate::domain::user::AuthorRef;
use crate::infra::db::Db;

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
            u.id AS author_id, u.username AS author_username, \
            u.first_name AS author_first_name, u.last_name AS author_last_name, \
            g.id AS group_id, g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        author_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Post> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, pub_date, author_id, group_id, image) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(text)
        .bind(OffsetDateTime::now_utc())
        .bind(author_id)
        .bind(group_id)
        .bind(image)
        .fetch_one(self.db.pool())
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", id))
    }

    pub async fn get(&self, post_id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = ?", POST_SELECT);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    /// Rewrites text and group. A `None` image keeps the stored one.
    pub async fn update(
        &self,
        post_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?",
        )
        .bind(text)
        .bind(group_id)
        .bind(image)
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(post_id).await
    }

    pub async fn delete(&self, post_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND author_id = ?")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self, filter: PostFilter) -> Result<i64> {
        let (clause, param) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM posts p{}", clause);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }
        Ok(query.fetch_one(self.db.pool()).await?)
    }

    /// Newest first. Ids follow `pub_date`, and the TEXT timestamps do not sort as strings.
    pub async fn list_window(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>> {
        let (clause, param) = filter_clause(filter);
        let sql = format!(
            "{}{} ORDER BY p.id DESC LIMIT ? OFFSET ?",
            POST_SELECT, clause
        );
        let mut query = sqlx::query(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }
        let rows = query
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// One listing page, picked from the raw `?page=` value.
    pub async fn page(
        &self,
        filter: PostFilter,
        raw_page: Option<&str>,
        per_page: i64,
    ) -> Result<Page<Post>> {
        let paginator = Paginator::new(self.count(filter).await?, per_page);
        let window = paginator.get_page(raw_page);
        let posts = self.list_window(filter, window).await?;
        Ok(paginator.page(window, posts))
    }
}

fn filter_clause(filter: PostFilter) -> (&'static str, Option<i64>) {
    match filter {
        PostFilter::All => ("", None),
        PostFilter::Group(group_id) => (" WHERE p.group_id = ?", Some(group_id)),
        PostFilter::Author(author_id) => (" WHERE p.author_id = ?", Some(author_id)),
        PostFilter::FollowedBy(user_id) => (
            " WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
            Some(user_id),
        ),
    }
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let first_name: String = row.try_get("author_first_name")?;
    let last_name: String = row.try_get("author_last_name")?;
    let author = AuthorRef::new(
        row.try_get("author_id")?,
        row.try_get("author_username")?,
        &first_name,
        &last_name,
    );

    let group_id: Option<i64> = row.try_get("group_id")?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            title: row.try_get("group_title")?,
            slug: row.try_get("group_slug")?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        pub_date: row.try_get("pub_date")?,
        author,
        group,
        image: row.try_get("image")?,
    })
}
