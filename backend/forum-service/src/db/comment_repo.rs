use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, CommentStore};
use crate::error::{AppError, Result};
use crate::models::{Comment, NewComment, SortOrder};

/// Comment columns joined with the author's display name; expects aliases `c` and `u`
const COMMENT_COLUMNS: &str = r#"
    c.id, c.post_id, c.parent_id, c.author_id, u.username AS author, c.content,
    c.url, c.image, c.votes, c.published_at
"#;

/// Repository for Comment operations
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentRepository {
    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let query = format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.author_id WHERE c.id = $1",
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let query = format!(
            r#"
            SELECT {}
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY {}
            "#,
            COMMENT_COLUMNS,
            SortOrder::Old.sql_clause("c")
        );

        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }

    async fn list_root_comments(&self, post_id: Uuid, order: SortOrder) -> Result<Vec<Comment>> {
        let query = format!(
            r#"
            SELECT {}
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1 AND c.parent_id IS NULL
            ORDER BY {}
            "#,
            COMMENT_COLUMNS,
            order.sql_clause("c")
        );

        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }

    async fn list_replies(&self, comment_id: Uuid) -> Result<Vec<Comment>> {
        self.list_replies_for(&[comment_id]).await
    }

    async fn list_replies_for(&self, parent_ids: &[Uuid]) -> Result<Vec<Comment>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {}
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.parent_id = ANY($1)
            ORDER BY {}
            "#,
            COMMENT_COLUMNS,
            SortOrder::Old.sql_clause("c")
        );

        let replies = sqlx::query_as::<_, Comment>(&query)
            .bind(parent_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(replies)
    }

    async fn insert_comment(&self, new_comment: &NewComment) -> Result<Comment> {
        let query = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (post_id, parent_id, author_id, content, url, image)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {} FROM c JOIN users u ON u.id = c.author_id
            "#,
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(new_comment.post_id)
            .bind(new_comment.parent_id)
            .bind(new_comment.author_id)
            .bind(&new_comment.content)
            .bind(&new_comment.url)
            .bind(&new_comment.image)
            .fetch_one(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn update_comment_content(
        &self,
        comment_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>> {
        let query = format!(
            r#"
            WITH c AS (
                UPDATE comments
                SET content = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM c JOIN users u ON u.id = c.author_id
            "#,
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(comment_id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn delete_comments(&self, ordered_ids: &[Uuid]) -> Result<u64> {
        let Some(&root) = ordered_ids.last() else {
            return Ok(0);
        };

        let mut tx = self.pool.begin().await?;

        // A concurrent delete of the same subtree blocks here until it commits
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM comments WHERE id = $1 FOR UPDATE")
                .bind(root)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(AppError::NotFound(format!("comment {}", root)));
        }

        let mut deleted = 0;

        for comment_id in ordered_ids {
            let result = sqlx::query("DELETE FROM comments WHERE id = $1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }

        tx.commit().await?;

        Ok(deleted)
    }

    async fn search_comments(&self, query: &str, limit: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.content ILIKE $1 ESCAPE '\'
            ORDER BY c.published_at DESC, c.id DESC
            LIMIT $2
            "#,
            COMMENT_COLUMNS
        );

        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(like_pattern(query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }
}
