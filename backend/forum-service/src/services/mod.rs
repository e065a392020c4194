/// Business logic layer for forum-service
///
/// This module provides high-level operations:
/// - Tree builder: nested comment forests with the viewer's vote overlay
/// - Vote service: idempotent up/down votes on posts and comments
/// - Comment service: creation, edits and cascade deletion
/// - Post, community and search services
/// - Identity: API-key hashing and user resolution
///
/// Every check (identity, existence, authorship, validation) runs before the
/// store is touched, so a rejected request leaves no trace.
use uuid::Uuid;

use crate::error::{AppError, Result};

pub mod comments;
pub mod communities;
pub mod identity;
pub mod posts;
pub mod search;
pub mod tree;
pub mod votes;

pub use comments::{CommentService, CreateComment};
pub use communities::{CommunityService, SubscriptionState};
pub use identity::IdentityService;
pub use posts::{CreatePost, EditPost, PostService};
pub use search::{SearchKind, SearchResults, SearchService};
pub use tree::CommentTreeBuilder;
pub use votes::{VoteService, VoteSummary};

/// Anonymous callers may read but never write
pub(crate) fn require_user(user_id: Option<Uuid>) -> Result<Uuid> {
    user_id.ok_or_else(|| AppError::AuthRequired("authentication required".to_string()))
}

pub(crate) fn ensure_author(requester: Uuid, author_id: Uuid, what: &str) -> Result<()> {
    if requester == author_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "only the author can modify this {}",
            what
        )))
    }
}

/// Trimmed, non-empty text of at most `max_len` characters
pub(crate) fn require_text(field: &str, raw: &str, max_len: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationFailed(format!("{} cannot be empty", field)));
    }

    let len = trimmed.chars().count();
    if len > max_len {
        return Err(AppError::ValidationFailed(format!(
            "{} is too long ({} > {} characters)",
            field, len, max_len
        )));
    }

    Ok(trimmed.to_string())
}

/// Blank optional values collapse to None
pub(crate) fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
