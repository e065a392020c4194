/// Data models for forum-service
///
/// This module defines:
/// - Post / Comment rows with their denormalized vote counters
/// - Vote values, directions and the tagged vote target
/// - The ordering policy shared by post listings and comment trees
/// - CommentNode, the nested shape returned by the tree builder
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;

pub mod community;
pub mod tree;

pub use community::{Community, CommunitySummary, PostView};
pub use tree::CommentNode;

/// Maximum post title length, in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum post or comment body length, in characters
pub const MAX_CONTENT_LEN: usize = 5000;

/// Maximum username length, in characters
pub const MAX_USERNAME_LEN: usize = 100;

/// Maximum community name length, in characters
pub const MAX_COMMUNITY_NAME_LEN: usize = 200;

/// Post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    /// Author display name
    pub author: String,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub votes: i64,
    #[serde(rename = "published_date")]
    pub published_at: DateTime<Utc>,
}

/// Comment entity - flat row, parent-referencing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    /// None for root comments
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    /// Author display name
    pub author: String,
    pub content: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub votes: i64,
    #[serde(rename = "published_date")]
    pub published_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Identity resolved from an API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// Input for post creation (already validated)
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub community_ids: Vec<Uuid>,
}

/// Partial post update; None leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` removes the link
    pub url: Option<Option<String>>,
}

/// Input for comment creation (already validated)
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub url: Option<String>,
    pub image: Option<String>,
}

// ============================================================================
// Votes
// ============================================================================

/// A user's vote on a target. Absence of a record reads as `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum VoteValue {
    Down,
    #[default]
    Neutral,
    Up,
}

impl VoteValue {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }

    /// Change to apply to the aggregate counter when moving from `previous` to `self`
    pub fn delta_from(self, previous: VoteValue) -> i64 {
        i64::from(self.as_i16()) - i64::from(previous.as_i16())
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        value.as_i16()
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            other => Err(AppError::ValidationFailed(format!(
                "vote value must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

/// Requested vote action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Vote value recorded after this action
    pub fn value(self) -> VoteValue {
        match self {
            VoteDirection::Up => VoteValue::Up,
            VoteDirection::Down => VoteValue::Down,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

/// Kind of votable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Post => "post",
            TargetKind::Comment => "comment",
        }
    }
}

/// Tagged vote target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl VoteTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            VoteTarget::Post(_) => TargetKind::Post,
            VoteTarget::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => *id,
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

/// Result of a ledger write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub previous: VoteValue,
    pub current: VoteValue,
    /// Aggregate counter after the write
    pub aggregate: i64,
}

impl VoteOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Ordering policy for post listings and comment trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Votes descending, newer first on ties
    #[default]
    Top,
    /// Newest first
    New,
    /// Oldest first
    Old,
}

/// Sort keys shared by posts and comments
pub trait Ranked {
    fn rank_id(&self) -> Uuid;
    fn rank_votes(&self) -> i64;
    fn rank_published_at(&self) -> DateTime<Utc>;
}

impl Ranked for Post {
    fn rank_id(&self) -> Uuid {
        self.id
    }
    fn rank_votes(&self) -> i64 {
        self.votes
    }
    fn rank_published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

impl Ranked for Comment {
    fn rank_id(&self) -> Uuid {
        self.id
    }
    fn rank_votes(&self) -> i64 {
        self.votes
    }
    fn rank_published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

impl SortOrder {
    /// Parse a query parameter. Missing or unrecognized values fall back to `Top`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("new") => SortOrder::New,
            Some("old") => SortOrder::Old,
            _ => SortOrder::Top,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Top => "top",
            SortOrder::New => "new",
            SortOrder::Old => "old",
        }
    }

    /// Total order; the id is the last tie-breaker so results are deterministic.
    pub fn compare<T: Ranked>(self, a: &T, b: &T) -> Ordering {
        match self {
            SortOrder::Top => b
                .rank_votes()
                .cmp(&a.rank_votes())
                .then_with(|| b.rank_published_at().cmp(&a.rank_published_at()))
                .then_with(|| a.rank_id().cmp(&b.rank_id())),
            SortOrder::Old => a
                .rank_published_at()
                .cmp(&b.rank_published_at())
                .then_with(|| a.rank_id().cmp(&b.rank_id())),
            SortOrder::New => b
                .rank_published_at()
                .cmp(&a.rank_published_at())
                .then_with(|| b.rank_id().cmp(&a.rank_id())),
        }
    }

    pub fn sort<T: Ranked>(self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }

    /// SQL ORDER BY clause matching `compare` for a table aliased `alias`
    pub fn sql_clause(self, alias: &str) -> String {
        match self {
            SortOrder::Top => format!(
                "{a}.votes DESC, {a}.published_at DESC, {a}.id ASC",
                a = alias
            ),
            SortOrder::Old => format!("{a}.published_at ASC, {a}.id ASC", a = alias),
            SortOrder::New => format!("{a}.published_at DESC, {a}.id DESC", a = alias),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(votes: i64, hour: u32) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            post_id: Uuid::nil(),
            parent_id: None,
            author_id: Uuid::nil(),
            author: "alice".to_string(),
            content: "hi".to_string(),
            url: None,
            image: None,
            votes,
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_sort_order_from_param_falls_back_to_top() {
        assert_eq!(SortOrder::from_param(None), SortOrder::Top);
        assert_eq!(SortOrder::from_param(Some("new")), SortOrder::New);
        assert_eq!(SortOrder::from_param(Some(" OLD ")), SortOrder::Old);
        assert_eq!(SortOrder::from_param(Some("hot")), SortOrder::Top);
        assert_eq!(SortOrder::from_param(Some("")), SortOrder::Top);
    }

    #[test]
    fn test_top_breaks_ties_by_recency() {
        let a = comment(5, 10);
        let b = comment(5, 11);
        let c = comment(2, 12);
        let mut items = vec![a.clone(), c.clone(), b.clone()];

        SortOrder::Top.sort(&mut items);
        assert_eq!(items, vec![b.clone(), a.clone(), c.clone()]);

        SortOrder::Old.sort(&mut items);
        assert_eq!(items, vec![a.clone(), b.clone(), c.clone()]);

        SortOrder::New.sort(&mut items);
        assert_eq!(items, vec![c, b, a]);
    }

    #[test]
    fn test_vote_value_delta() {
        assert_eq!(VoteValue::Up.delta_from(VoteValue::Down), 2);
        assert_eq!(VoteValue::Up.delta_from(VoteValue::Neutral), 1);
        assert_eq!(VoteValue::Down.delta_from(VoteValue::Up), -2);
        assert_eq!(VoteValue::Down.delta_from(VoteValue::Down), 0);
    }

    #[test]
    fn test_vote_value_rejects_out_of_range() {
        assert_eq!(VoteValue::try_from(-1).unwrap(), VoteValue::Down);
        assert!(VoteValue::try_from(2).is_err());
        assert_eq!(serde_json::to_value(VoteValue::Up).unwrap(), serde_json::json!(1));
        assert_eq!(
            serde_json::from_value::<VoteValue>(serde_json::json!(-1)).unwrap(),
            VoteValue::Down
        );
    }

    #[test]
    fn test_vote_target_dispatch() {
        let id = Uuid::new_v4();
        assert_eq!(VoteTarget::Post(id).kind(), TargetKind::Post);
        assert_eq!(VoteTarget::Comment(id).id(), id);
        assert_eq!(VoteDirection::Down.value(), VoteValue::Down);
    }
}
