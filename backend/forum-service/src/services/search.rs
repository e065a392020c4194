use serde::Serialize;
use uuid::Uuid;

use super::PostService;
use crate::db::{CommentStore, PostStore};
use crate::error::{AppError, Result};
use crate::models::{Comment, PostView};
use std::sync::Arc;

/// What a search covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Posts,
    Comments,
    Both,
}

impl SearchKind {
    /// Missing means `both`; anything unrecognized is rejected
    pub fn from_param(raw: Option<&str>) -> Result<Self> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("both") => Ok(SearchKind::Both),
            Some("posts") => Ok(SearchKind::Posts),
            Some("comments") => Ok(SearchKind::Comments),
            Some(other) => Err(AppError::ValidationFailed(format!(
                "type must be posts, comments or both, got '{}'",
                other
            ))),
        }
    }

    fn includes_posts(self) -> bool {
        matches!(self, SearchKind::Posts | SearchKind::Both)
    }

    fn includes_comments(self) -> bool {
        matches!(self, SearchKind::Comments | SearchKind::Both)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PostView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

/// Case-insensitive search over post titles and comment bodies, newest first
#[derive(Clone)]
pub struct SearchService {
    posts: Arc<dyn PostStore>,
    comments: Arc<dyn CommentStore>,
    post_views: PostService,
}

impl SearchService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        comments: Arc<dyn CommentStore>,
        post_views: PostService,
    ) -> Self {
        Self {
            posts,
            comments,
            post_views,
        }
    }

    pub async fn search(
        &self,
        viewer: Option<Uuid>,
        query: &str,
        kind: SearchKind,
        limit: i64,
    ) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::ValidationFailed(
                "query parameter q is required".to_string(),
            ));
        }

        let posts = if kind.includes_posts() {
            let found = self.posts.search_posts(query, limit).await?;
            Some(self.post_views.views(viewer, found).await?)
        } else {
            None
        };

        let comments = if kind.includes_comments() {
            Some(self.comments.search_comments(query, limit).await?)
        } else {
            None
        };

        tracing::debug!(query, kind = ?kind, "search executed");
        Ok(SearchResults {
            query: query.to_string(),
            kind,
            posts,
            comments,
        })
    }
}
