/// Database access layer
///
/// The core consumes these traits only; two implementations exist:
/// - PostgreSQL repositories (`*_repo` modules), one per aggregate
/// - `MemoryStore`, an in-process store for tests and local development
///
/// The vote counters on posts and comments are written exclusively by
/// `VoteLedger::record_vote`.
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Comment, Community, CommunitySummary, NewComment, NewPost, Post, PostUpdate, SortOrder,
    TargetKind, User, VoteOutcome, VoteTarget, VoteValue,
};

pub mod comment_repo;
pub mod community_repo;
pub mod memory;
pub mod post_repo;
pub mod user_repo;
pub mod vote_repo;

pub use comment_repo::PgCommentRepository;
pub use community_repo::PgCommunityRepository;
pub use memory::MemoryStore;
pub use post_repo::PgPostRepository;
pub use user_repo::PgUserRepository;
pub use vote_repo::PgVoteRepository;

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Identity lookups
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolve a user from the SHA-256 hex digest of their API key
    async fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<User>>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn create_user(&self, username: &str, api_key_hash: &str) -> Result<User>;
}

/// Post persistence
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>>;

    async fn list_posts(&self, order: SortOrder, limit: i64, offset: i64) -> Result<Vec<Post>>;

    /// Insert the post and its community memberships atomically
    async fn insert_post(&self, new_post: &NewPost) -> Result<Post>;

    async fn update_post(&self, post_id: Uuid, update: &PostUpdate) -> Result<Option<Post>>;

    /// Delete the post; its comments and votes go with it
    async fn delete_post(&self, post_id: Uuid) -> Result<bool>;

    /// Case-insensitive title match, newest first
    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>>;

    /// Communities (with aggregates) of each given post
    async fn communities_of(&self, post_ids: &[Uuid])
        -> Result<HashMap<Uuid, Vec<CommunitySummary>>>;
}

/// Flat, parent-referencing comment storage
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>>;

    /// Every comment of a post, oldest first
    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>>;

    /// Parent-less comments of a post, ordered by `order`
    async fn list_root_comments(&self, post_id: Uuid, order: SortOrder) -> Result<Vec<Comment>>;

    /// Direct replies of a comment, oldest first
    async fn list_replies(&self, comment_id: Uuid) -> Result<Vec<Comment>>;

    /// Direct replies of every given parent, oldest first
    async fn list_replies_for(&self, parent_ids: &[Uuid]) -> Result<Vec<Comment>>;

    async fn insert_comment(&self, new_comment: &NewComment) -> Result<Comment>;

    async fn update_comment_content(&self, comment_id: Uuid, content: &str)
        -> Result<Option<Comment>>;

    /// Delete the given comments in order, in a single transaction.
    ///
    /// The last id is the subtree root. It is locked before anything is
    /// removed; NotFound when it is already gone, so concurrent deletes of
    /// one subtree succeed exactly once. Returns the number of rows removed.
    async fn delete_comments(&self, ordered_ids: &[Uuid]) -> Result<u64>;

    /// Case-insensitive content match, newest first
    async fn search_comments(&self, query: &str, limit: i64) -> Result<Vec<Comment>>;
}

/// Per-(user, target) vote records plus the aggregate counter they feed
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// The user's current vote; `Neutral` when no record exists
    async fn get_vote(&self, user_id: Uuid, target: VoteTarget) -> Result<VoteValue>;

    /// Non-neutral votes of a user over many targets of one kind
    async fn votes_for(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>>;

    /// Current aggregate counter, None when the target does not exist
    async fn get_aggregate(&self, target: VoteTarget) -> Result<Option<i64>>;

    /// Set the user's vote to `value`, adjusting the aggregate by the difference.
    ///
    /// Record upsert and counter adjustment commit together. When the record
    /// already holds `value` nothing is written. Fails with NotFound when the
    /// target does not exist.
    async fn record_vote(
        &self,
        user_id: Uuid,
        target: VoteTarget,
        value: VoteValue,
    ) -> Result<VoteOutcome>;
}

/// Communities and subscriptions
#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn list_communities(&self) -> Result<Vec<CommunitySummary>>;

    async fn get_community(&self, community_id: Uuid) -> Result<Option<CommunitySummary>>;

    async fn create_community(
        &self,
        name: &str,
        avatar: Option<&str>,
        banner: Option<&str>,
    ) -> Result<Community>;

    /// Ids from `community_ids` that do not exist
    async fn missing_communities(&self, community_ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Posts of a community, newest first
    async fn community_posts(&self, community_id: Uuid) -> Result<Vec<Post>>;

    /// Returns true when the subscription state changed
    async fn set_subscription(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool>;
}

/// Escape LIKE metacharacters and wrap the term for a substring match
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
