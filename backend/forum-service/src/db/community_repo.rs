use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::post_repo::POST_COLUMNS;
use super::CommunityStore;
use crate::error::Result;
use crate::models::{Community, CommunitySummary, Post};

/// Community columns with real aggregate counts; expects alias `c`
pub(crate) const COMMUNITY_AGGREGATES: &str = r#"
    c.id, c.name, c.avatar, c.banner,
    (SELECT COUNT(*) FROM community_subscriptions s WHERE s.community_id = c.id) AS subs_count,
    (SELECT COUNT(*) FROM post_communities x WHERE x.community_id = c.id) AS posts_count,
    (SELECT COUNT(*)
       FROM comments cm
       JOIN post_communities y ON y.post_id = cm.post_id
      WHERE y.community_id = c.id) AS comments_count
"#;

/// Repository for Community operations
#[derive(Clone)]
pub struct PgCommunityRepository {
    pool: PgPool,
}

impl PgCommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityStore for PgCommunityRepository {
    async fn list_communities(&self) -> Result<Vec<CommunitySummary>> {
        let query = format!(
            "SELECT {} FROM communities c ORDER BY c.name NULLS LAST, c.id",
            COMMUNITY_AGGREGATES
        );

        let communities = sqlx::query_as::<_, CommunitySummary>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(communities)
    }

    async fn get_community(&self, community_id: Uuid) -> Result<Option<CommunitySummary>> {
        let query = format!(
            "SELECT {} FROM communities c WHERE c.id = $1",
            COMMUNITY_AGGREGATES
        );

        let community = sqlx::query_as::<_, CommunitySummary>(&query)
            .bind(community_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(community)
    }

    async fn create_community(
        &self,
        name: &str,
        avatar: Option<&str>,
        banner: Option<&str>,
    ) -> Result<Community> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (name, avatar, banner)
            VALUES ($1, $2, $3)
            RETURNING id, name, avatar, banner
            "#,
        )
        .bind(name)
        .bind(avatar)
        .bind(banner)
        .fetch_one(&self.pool)
        .await?;

        Ok(community)
    }

    async fn missing_communities(&self, community_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if community_ids.is_empty() {
            return Ok(Vec::new());
        }

        let missing: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT requested.id
            FROM UNNEST($1::uuid[]) AS requested(id)
            WHERE NOT EXISTS (SELECT 1 FROM communities c WHERE c.id = requested.id)
            "#,
        )
        .bind(community_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(missing)
    }

    async fn community_posts(&self, community_id: Uuid) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {}
            FROM posts p
            JOIN users u ON u.id = p.author_id
            JOIN post_communities pc ON pc.post_id = p.id
            WHERE pc.community_id = $1
            ORDER BY p.published_at DESC, p.id DESC
            "#,
            POST_COLUMNS
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(community_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn set_subscription(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool> {
        let result = if subscribed {
            sqlx::query(
                r#"
                INSERT INTO community_subscriptions (community_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (community_id, user_id) DO NOTHING
                "#,
            )
            .bind(community_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                DELETE FROM community_subscriptions
                WHERE community_id = $1 AND user_id = $2
                "#,
            )
            .bind(community_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }
}
