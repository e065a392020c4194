use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::community_repo::COMMUNITY_AGGREGATES;
use super::{like_pattern, PostStore};
use crate::error::Result;
use crate::models::{CommunitySummary, NewPost, Post, PostUpdate, SortOrder};

/// Post columns joined with the author's display name; expects aliases `p` and `u`
pub(crate) const POST_COLUMNS: &str = r#"
    p.id, p.author_id, u.username AS author, p.title, p.content, p.url, p.image,
    p.votes, p.published_at
"#;

/// Helper row for community membership lookups
#[derive(sqlx::FromRow)]
struct PostCommunityRow {
    post_id: Uuid,
    #[sqlx(flatten)]
    community: CommunitySummary,
}

/// Repository for Post operations
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostRepository {
    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let query = format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.author_id WHERE p.id = $1",
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn list_posts(&self, order: SortOrder, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {}
            FROM posts p JOIN users u ON u.id = p.author_id
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            POST_COLUMNS,
            order.sql_clause("p")
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn insert_post(&self, new_post: &NewPost) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            WITH p AS (
                INSERT INTO posts (author_id, title, content, url, image)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {} FROM p JOIN users u ON u.id = p.author_id
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(new_post.author_id)
            .bind(&new_post.title)
            .bind(&new_post.content)
            .bind(&new_post.url)
            .bind(&new_post.image)
            .fetch_one(&mut *tx)
            .await?;

        if !new_post.community_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO post_communities (post_id, community_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(post.id)
            .bind(&new_post.community_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(post)
    }

    async fn update_post(&self, post_id: Uuid, update: &PostUpdate) -> Result<Option<Post>> {
        let query = format!(
            r#"
            WITH p AS (
                UPDATE posts
                SET title = COALESCE($2, title),
                    content = COALESCE($3, content),
                    url = CASE WHEN $4 THEN $5 ELSE url END,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM p JOIN users u ON u.id = p.author_id
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post_id)
            .bind(&update.title)
            .bind(&update.content)
            .bind(update.url.is_some())
            .bind(update.url.as_ref().and_then(|url| url.as_deref()))
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        // comments, votes and memberships cascade via foreign keys
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM posts p JOIN users u ON u.id = p.author_id
            WHERE p.title ILIKE $1 ESCAPE '\'
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT $2
            "#,
            POST_COLUMNS
        );

        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(like_pattern(query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn communities_of(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<CommunitySummary>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!(
            r#"
            SELECT pc.post_id, {}
            FROM post_communities pc
            JOIN communities c ON c.id = pc.community_id
            WHERE pc.post_id = ANY($1)
            ORDER BY c.name NULLS LAST, c.id
            "#,
            COMMUNITY_AGGREGATES
        );

        let rows = sqlx::query_as::<_, PostCommunityRow>(&query)
            .bind(post_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut result: HashMap<Uuid, Vec<CommunitySummary>> = HashMap::new();
        for row in rows {
            result.entry(row.post_id).or_default().push(row.community);
        }

        Ok(result)
    }
}
