/// Comment service - creation, edits and cascade deletion
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ensure_author, optional_text, require_text, require_user};
use crate::db::{CommentStore, PostStore};
use crate::error::{AppError, Result};
use crate::metrics::forum as metrics;
use crate::models::{Comment, NewComment};

/// Request body for comment creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostStore>,
    comments: Arc<dyn CommentStore>,
    max_content_len: usize,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        comments: Arc<dyn CommentStore>,
        max_content_len: usize,
    ) -> Self {
        Self {
            posts,
            comments,
            max_content_len,
        }
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Comment> {
        self.comments
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {}", comment_id)))
    }

    /// Create a root comment or a reply; the comment inherits the post's URL
    pub async fn create_comment(
        &self,
        author_id: Option<Uuid>,
        post_id: Uuid,
        request: CreateComment,
    ) -> Result<Comment> {
        let author_id = require_user(author_id)?;
        let content = require_text("content", &request.content, self.max_content_len)?;

        let post = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        if let Some(parent_id) = request.parent_id {
            let parent = self.get_comment(parent_id).await?;
            if parent.post_id != post_id {
                return Err(AppError::ValidationFailed(format!(
                    "parent comment {} belongs to another post",
                    parent_id
                )));
            }
        }

        let comment = self
            .comments
            .insert_comment(&NewComment {
                post_id,
                parent_id: request.parent_id,
                author_id,
                content,
                url: post.url,
                image: optional_text(request.image.as_deref()),
            })
            .await?;

        tracing::info!(
            comment_id = %comment.id,
            %post_id,
            parent_id = ?comment.parent_id,
            "comment created"
        );
        Ok(comment)
    }

    /// Replace the content of the caller's own comment
    pub async fn edit_comment(
        &self,
        requester: Option<Uuid>,
        comment_id: Uuid,
        content: &str,
    ) -> Result<Comment> {
        let requester = require_user(requester)?;
        let content = require_text("content", content, self.max_content_len)?;

        let comment = self.get_comment(comment_id).await?;
        ensure_author(requester, comment.author_id, "comment")?;

        self.comments
            .update_comment_content(comment_id, &content)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {}", comment_id)))
    }

    /// Delete a comment and every descendant; returns the number of rows removed
    pub async fn delete_comment(&self, requester: Option<Uuid>, comment_id: Uuid) -> Result<u64> {
        let requester = require_user(requester)?;
        let comment = self.get_comment(comment_id).await?;
        ensure_author(requester, comment.author_id, "comment")?;

        let ordered = self.collect_subtree(comment_id).await?;
        let deleted = self.comments.delete_comments(&ordered).await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("comment {}", comment_id)));
        }

        metrics::record_comments_deleted(deleted);
        tracing::info!(%comment_id, deleted, "comment subtree deleted");
        Ok(deleted)
    }

    /// Subtree ids with every descendant ahead of its ancestors, `root` last
    async fn collect_subtree(&self, root: Uuid) -> Result<Vec<Uuid>> {
        let mut preorder = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            preorder.push(id);
            for reply in self.comments.list_replies(id).await? {
                stack.push(reply.id);
            }
        }

        preorder.reverse();
        Ok(preorder)
    }
}
