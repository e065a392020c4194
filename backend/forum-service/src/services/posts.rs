/// Post service - creation, listing, edits and deletion
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{ensure_author, optional_text, require_text, require_user};
use crate::config::ForumConfig;
use crate::db::{CommunityStore, PostStore, VoteLedger};
use crate::error::{AppError, Result};
use crate::models::{NewPost, Post, PostUpdate, PostView, SortOrder, TargetKind};

/// Request body for post creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub community_ids: Vec<Uuid>,
}

/// Request body for post edits; absent fields are left untouched.
/// A blank `url` removes the post's link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditPost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostStore>,
    communities: Arc<dyn CommunityStore>,
    votes: Arc<dyn VoteLedger>,
    limits: ForumConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        communities: Arc<dyn CommunityStore>,
        votes: Arc<dyn VoteLedger>,
        limits: ForumConfig,
    ) -> Self {
        Self {
            posts,
            communities,
            votes,
            limits,
        }
    }

    pub fn default_page_limit(&self) -> i64 {
        self.limits.default_page_limit
    }

    pub async fn list_posts(
        &self,
        viewer: Option<Uuid>,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>> {
        let posts = self.posts.list_posts(order, limit, offset).await?;
        self.views(viewer, posts).await
    }

    pub async fn get_post(&self, viewer: Option<Uuid>, post_id: Uuid) -> Result<PostView> {
        let post = self.find_post(post_id).await?;
        let mut views = self.views(viewer, vec![post]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal(format!("post {} vanished from view", post_id)))
    }

    pub async fn create_post(&self, author_id: Option<Uuid>, request: CreatePost) -> Result<PostView> {
        let author_id = require_user(author_id)?;
        let title = require_text("title", &request.title, self.limits.max_title_len)?;
        let content = require_text("content", &request.content, self.limits.max_content_len)?;
        let url = validate_url(request.url.as_deref())?;

        let mut community_ids = request.community_ids;
        community_ids.sort();
        community_ids.dedup();

        let missing = self.communities.missing_communities(&community_ids).await?;
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(Uuid::to_string).collect();
            return Err(AppError::NotFound(format!(
                "communities not found: {}",
                missing.join(", ")
            )));
        }

        let post = self
            .posts
            .insert_post(&NewPost {
                author_id,
                title,
                content,
                url,
                image: optional_text(request.image.as_deref()),
                community_ids,
            })
            .await?;

        tracing::info!(post_id = %post.id, %author_id, "post created");
        self.get_post(Some(author_id), post.id).await
    }

    pub async fn edit_post(
        &self,
        requester: Option<Uuid>,
        post_id: Uuid,
        request: EditPost,
    ) -> Result<PostView> {
        let requester = require_user(requester)?;

        let update = PostUpdate {
            title: request
                .title
                .as_deref()
                .map(|title| require_text("title", title, self.limits.max_title_len))
                .transpose()?,
            content: request
                .content
                .as_deref()
                .map(|content| require_text("content", content, self.limits.max_content_len))
                .transpose()?,
            url: request
                .url
                .as_deref()
                .map(|url| validate_url(Some(url)))
                .transpose()?,
        };

        let post = self.find_post(post_id).await?;
        ensure_author(requester, post.author_id, "post")?;

        self.posts
            .update_post(post_id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        tracing::info!(%post_id, "post updated");
        self.get_post(Some(requester), post_id).await
    }

    /// Delete a post together with its comments and votes
    pub async fn delete_post(&self, requester: Option<Uuid>, post_id: Uuid) -> Result<()> {
        let requester = require_user(requester)?;
        let post = self.find_post(post_id).await?;
        ensure_author(requester, post.author_id, "post")?;

        if !self.posts.delete_post(post_id).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        tracing::info!(%post_id, "post deleted");
        Ok(())
    }

    /// Attach communities and the viewer's vote to each post, preserving order
    pub async fn views(&self, viewer: Option<Uuid>, posts: Vec<Post>) -> Result<Vec<PostView>> {
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut communities = self.posts.communities_of(&ids).await?;
        let overlay = match viewer {
            Some(user_id) if !ids.is_empty() => {
                self.votes.votes_for(user_id, TargetKind::Post, &ids).await?
            }
            _ => HashMap::new(),
        };

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                communities: communities.remove(&post.id).unwrap_or_default(),
                user_vote: overlay.get(&post.id).copied().unwrap_or_default(),
                post,
            })
            .collect())
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Post> {
        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }
}

/// External links must be absolute http(s) URLs; blank means none
fn validate_url(raw: Option<&str>) -> Result<Option<String>> {
    let Some(url) = optional_text(raw) else {
        return Ok(None);
    };

    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') && url.len() <= 2048 => {
            Ok(Some(url))
        }
        _ => Err(AppError::ValidationFailed(format!(
            "url must be an absolute http(s) link: {}",
            url
        ))),
    }
}
