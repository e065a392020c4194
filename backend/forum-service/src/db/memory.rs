/// In-process store implementing every storage trait over one shared state.
///
/// Mirrors the PostgreSQL schema's constraints: foreign keys are checked on
/// insert, deletes cascade, and (user, target) vote records are unique. All
/// writes for one call happen under a single write lock, which gives the same
/// atomicity the SQL transactions provide.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommentStore, CommunityStore, PostStore, UserStore, VoteLedger};
use crate::error::{AppError, Result};
use crate::models::{
    Comment, Community, CommunitySummary, NewComment, NewPost, Post, PostUpdate, SortOrder,
    TargetKind, User, VoteOutcome, VoteTarget, VoteValue,
};
use crate::services::identity::hash_api_key;

struct StoredUser {
    user: User,
    api_key_hash: String,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, StoredUser>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    /// parent comment id -> direct reply ids
    replies: HashMap<Uuid, Vec<Uuid>>,
    communities: HashMap<Uuid, Community>,
    /// (post_id, community_id)
    post_communities: BTreeSet<(Uuid, Uuid)>,
    /// (community_id, user_id)
    subscriptions: HashSet<(Uuid, Uuid)>,
    /// (user_id, post_id) -> value
    post_votes: HashMap<(Uuid, Uuid), VoteValue>,
    /// (user_id, comment_id) -> value
    comment_votes: HashMap<(Uuid, Uuid), VoteValue>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing creation timestamps, so `old`/`new` never tie on time
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn username(&self, user_id: Uuid) -> Result<String> {
        self.users
            .get(&user_id)
            .map(|stored| stored.user.username.clone())
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    fn summary(&self, community: &Community) -> CommunitySummary {
        let post_ids: HashSet<Uuid> = self
            .post_communities
            .iter()
            .filter(|(_, community_id)| *community_id == community.id)
            .map(|(post_id, _)| *post_id)
            .collect();

        CommunitySummary {
            id: community.id,
            name: community.name.clone(),
            avatar: community.avatar.clone(),
            banner: community.banner.clone(),
            subs_count: self
                .subscriptions
                .iter()
                .filter(|(community_id, _)| *community_id == community.id)
                .count() as i64,
            posts_count: post_ids.len() as i64,
            comments_count: self
                .comments
                .values()
                .filter(|c| post_ids.contains(&c.post_id))
                .count() as i64,
        }
    }

    fn sorted_summaries<'a>(
        &self,
        communities: impl Iterator<Item = &'a Community>,
    ) -> Vec<CommunitySummary> {
        let mut summaries: Vec<CommunitySummary> =
            communities.map(|community| self.summary(community)).collect();
        summaries.sort_by(|a, b| {
            (a.name.is_none(), &a.name, a.id).cmp(&(b.name.is_none(), &b.name, b.id))
        });
        summaries
    }

    fn target_exists(&self, target: VoteTarget) -> bool {
        match target {
            VoteTarget::Post(id) => self.posts.contains_key(&id),
            VoteTarget::Comment(id) => self.comments.contains_key(&id),
        }
    }

    fn ledger(&mut self, kind: TargetKind) -> &mut HashMap<(Uuid, Uuid), VoteValue> {
        match kind {
            TargetKind::Post => &mut self.post_votes,
            TargetKind::Comment => &mut self.comment_votes,
        }
    }

    fn counter(&mut self, target: VoteTarget) -> Option<&mut i64> {
        match target {
            VoteTarget::Post(id) => self.posts.get_mut(&id).map(|p| &mut p.votes),
            VoteTarget::Comment(id) => self.comments.get_mut(&id).map(|c| &mut c.votes),
        }
    }

    fn store_comment(&mut self, comment: Comment) {
        if let Some(parent_id) = comment.parent_id {
            self.replies.entry(parent_id).or_default().push(comment.id);
        }
        self.comments.insert(comment.id, comment);
    }

    /// Remove a comment; replies go with it, as ON DELETE CASCADE on parent_id does
    fn remove_comment(&mut self, comment_id: Uuid) -> bool {
        let Some(comment) = self.comments.remove(&comment_id) else {
            return false;
        };
        if let Some(siblings) = comment.parent_id.and_then(|p| self.replies.get_mut(&p)) {
            siblings.retain(|id| *id != comment_id);
        }

        let mut pending = vec![comment_id];
        while let Some(id) = pending.pop() {
            self.comment_votes.retain(|(_, target), _| *target != id);
            for child in self.replies.remove(&id).unwrap_or_default() {
                self.comments.remove(&child);
                pending.push(child);
            }
        }
        true
    }
}

/// Shared in-memory store; clones share state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user reachable through `api_key`
    pub async fn add_user(&self, username: &str, api_key: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        self.state.write().await.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                api_key_hash: hash_api_key(api_key),
            },
        );
        user
    }

    pub async fn add_community(&self, name: &str) -> Community {
        let community = Community {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            avatar: None,
            banner: None,
        };
        self.state
            .write()
            .await
            .communities
            .insert(community.id, community.clone());
        community
    }

    /// Insert a post row verbatim (fixture helper; bypasses validation)
    pub async fn insert_post_row(&self, post: Post) {
        self.state.write().await.posts.insert(post.id, post);
    }

    /// Insert a comment row verbatim (fixture helper; bypasses validation)
    pub async fn insert_comment_row(&self, comment: Comment) {
        self.state.write().await.store_comment(comment);
    }

    pub async fn comment_count(&self) -> usize {
        self.state.read().await.comments.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|stored| stored.api_key_hash == api_key_hash)
            .map(|stored| stored.user.clone()))
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).map(|stored| stored.user.clone()))
    }

    async fn create_user(&self, username: &str, api_key_hash: &str) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|s| s.user.username == username) {
            return Err(AppError::ValidationFailed(format!(
                "username '{}' is taken",
                username
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                api_key_hash: api_key_hash.to_string(),
            },
        );
        Ok(user)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self.state.read().await.posts.get(&post_id).cloned())
    }

    async fn list_posts(&self, order: SortOrder, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state.posts.values().cloned().collect();
        order.sort(&mut posts);

        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert_post(&self, new_post: &NewPost) -> Result<Post> {
        let mut state = self.state.write().await;
        let author = state.username(new_post.author_id)?;

        if let Some(missing) = new_post
            .community_ids
            .iter()
            .find(|id| !state.communities.contains_key(id))
        {
            return Err(AppError::NotFound(format!("community {}", missing)));
        }

        let post = Post {
            id: Uuid::new_v4(),
            author_id: new_post.author_id,
            author,
            title: new_post.title.clone(),
            content: new_post.content.clone(),
            url: new_post.url.clone(),
            image: new_post.image.clone(),
            votes: 0,
            published_at: state.next_timestamp(),
        };

        for community_id in &new_post.community_ids {
            state.post_communities.insert((post.id, *community_id));
        }
        state.posts.insert(post.id, post.clone());

        Ok(post)
    }

    async fn update_post(&self, post_id: Uuid, update: &PostUpdate) -> Result<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            post.title = title.clone();
        }
        if let Some(content) = &update.content {
            post.content = content.clone();
        }
        if let Some(url) = &update.url {
            post.url = url.clone();
        }

        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.posts.remove(&post_id).is_none() {
            return Ok(false);
        }

        let comment_ids: Vec<Uuid> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.id)
            .collect();
        for id in comment_ids {
            state.remove_comment(id);
        }
        state.post_votes.retain(|(_, id), _| *id != post_id);
        state.post_communities.retain(|(id, _)| *id != post_id);

        Ok(true)
    }

    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        SortOrder::New.sort(&mut posts);
        posts.truncate(limit.max(0) as usize);
        Ok(posts)
    }

    async fn communities_of(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<CommunitySummary>>> {
        let state = self.state.read().await;
        let mut result = HashMap::new();

        for post_id in post_ids {
            let communities = state
                .post_communities
                .iter()
                .filter(|(id, _)| id == post_id)
                .filter_map(|(_, community_id)| state.communities.get(community_id));
            let summaries = state.sorted_summaries(communities);
            if !summaries.is_empty() {
                result.insert(*post_id, summaries);
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        Ok(self.state.read().await.comments.get(&comment_id).cloned())
    }

    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        SortOrder::Old.sort(&mut comments);
        Ok(comments)
    }

    async fn list_root_comments(&self, post_id: Uuid, order: SortOrder) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.is_root())
            .cloned()
            .collect();
        order.sort(&mut comments);
        Ok(comments)
    }

    async fn list_replies(&self, comment_id: Uuid) -> Result<Vec<Comment>> {
        self.list_replies_for(&[comment_id]).await
    }

    async fn list_replies_for(&self, parent_ids: &[Uuid]) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        let mut replies: Vec<Comment> = parent_ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|parent_id| state.replies.get(parent_id))
            .flatten()
            .filter_map(|id| state.comments.get(id))
            .cloned()
            .collect();
        SortOrder::Old.sort(&mut replies);
        Ok(replies)
    }

    async fn insert_comment(&self, new_comment: &NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&new_comment.post_id) {
            return Err(AppError::NotFound(format!("post {}", new_comment.post_id)));
        }
        if let Some(parent_id) = new_comment.parent_id {
            if !state.comments.contains_key(&parent_id) {
                return Err(AppError::NotFound(format!("comment {}", parent_id)));
            }
        }
        let author = state.username(new_comment.author_id)?;

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: new_comment.post_id,
            parent_id: new_comment.parent_id,
            author_id: new_comment.author_id,
            author,
            content: new_comment.content.clone(),
            url: new_comment.url.clone(),
            image: new_comment.image.clone(),
            votes: 0,
            published_at: state.next_timestamp(),
        };
        state.store_comment(comment.clone());

        Ok(comment)
    }

    async fn update_comment_content(
        &self,
        comment_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>> {
        let mut state = self.state.write().await;
        Ok(state.comments.get_mut(&comment_id).map(|comment| {
            comment.content = content.to_string();
            comment.clone()
        }))
    }

    async fn delete_comments(&self, ordered_ids: &[Uuid]) -> Result<u64> {
        let Some(root) = ordered_ids.last() else {
            return Ok(0);
        };

        let mut state = self.state.write().await;
        if !state.comments.contains_key(root) {
            return Err(AppError::NotFound(format!("comment {}", root)));
        }

        let mut deleted = 0;

        for id in ordered_ids {
            if state.remove_comment(*id) {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn search_comments(&self, query: &str, limit: i64) -> Result<Vec<Comment>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        SortOrder::New.sort(&mut comments);
        comments.truncate(limit.max(0) as usize);
        Ok(comments)
    }
}

#[async_trait]
impl VoteLedger for MemoryStore {
    async fn get_vote(&self, user_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        let state = self.state.read().await;
        let ledger = match target.kind() {
            TargetKind::Post => &state.post_votes,
            TargetKind::Comment => &state.comment_votes,
        };
        Ok(ledger
            .get(&(user_id, target.id()))
            .copied()
            .unwrap_or_default())
    }

    async fn votes_for(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>> {
        let state = self.state.read().await;
        let ledger = match kind {
            TargetKind::Post => &state.post_votes,
            TargetKind::Comment => &state.comment_votes,
        };

        Ok(target_ids
            .iter()
            .filter_map(|id| {
                ledger
                    .get(&(user_id, *id))
                    .filter(|value| **value != VoteValue::Neutral)
                    .map(|value| (*id, *value))
            })
            .collect())
    }

    async fn get_aggregate(&self, target: VoteTarget) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(match target {
            VoteTarget::Post(id) => state.posts.get(&id).map(|p| p.votes),
            VoteTarget::Comment(id) => state.comments.get(&id).map(|c| c.votes),
        })
    }

    async fn record_vote(
        &self,
        user_id: Uuid,
        target: VoteTarget,
        value: VoteValue,
    ) -> Result<VoteOutcome> {
        let mut state = self.state.write().await;

        if !state.target_exists(target) {
            return Err(AppError::NotFound(format!(
                "{} {}",
                target.kind().as_str(),
                target.id()
            )));
        }

        let record = state
            .ledger(target.kind())
            .entry((user_id, target.id()))
            .or_default();
        let previous = *record;
        *record = value;

        let delta = value.delta_from(previous);
        let counter = state
            .counter(target)
            .ok_or_else(|| AppError::NotFound(target.to_string()))?;
        *counter += delta;

        Ok(VoteOutcome {
            previous,
            current: value,
            aggregate: *counter,
        })
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn list_communities(&self) -> Result<Vec<CommunitySummary>> {
        let state = self.state.read().await;
        Ok(state.sorted_summaries(state.communities.values()))
    }

    async fn get_community(&self, community_id: Uuid) -> Result<Option<CommunitySummary>> {
        let state = self.state.read().await;
        Ok(state
            .communities
            .get(&community_id)
            .map(|community| state.summary(community)))
    }

    async fn create_community(
        &self,
        name: &str,
        avatar: Option<&str>,
        banner: Option<&str>,
    ) -> Result<Community> {
        let community = Community {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            avatar: avatar.map(str::to_string),
            banner: banner.map(str::to_string),
        };
        self.state
            .write()
            .await
            .communities
            .insert(community.id, community.clone());
        Ok(community)
    }

    async fn missing_communities(&self, community_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(community_ids
            .iter()
            .filter(|id| !state.communities.contains_key(id))
            .copied()
            .collect())
    }

    async fn community_posts(&self, community_id: Uuid) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .post_communities
            .iter()
            .filter(|(_, id)| *id == community_id)
            .filter_map(|(post_id, _)| state.posts.get(post_id).cloned())
            .collect();
        SortOrder::New.sort(&mut posts);
        Ok(posts)
    }

    async fn set_subscription(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        subscribed: bool,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.communities.contains_key(&community_id) {
            return Err(AppError::NotFound(format!("community {}", community_id)));
        }

        Ok(if subscribed {
            state.subscriptions.insert((community_id, user_id))
        } else {
            state.subscriptions.remove(&(community_id, user_id))
        })
    }
}
