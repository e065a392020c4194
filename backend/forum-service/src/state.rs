/// Shared application state: one handle per storage trait
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::ForumConfig;
use crate::db::{
    CommentStore, CommunityStore, MemoryStore, PgCommentRepository, PgCommunityRepository,
    PgPostRepository, PgUserRepository, PgVoteRepository, PostStore, UserStore, VoteLedger,
};
use crate::services::{
    CommentService, CommentTreeBuilder, CommunityService, IdentityService, PostService,
    SearchService, VoteService,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    pub votes: Arc<dyn VoteLedger>,
    pub communities: Arc<dyn CommunityStore>,
    pub forum: ForumConfig,
}

impl AppState {
    pub fn postgres(pool: PgPool, forum: ForumConfig) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            comments: Arc::new(PgCommentRepository::new(pool.clone())),
            votes: Arc::new(PgVoteRepository::new(pool.clone())),
            communities: Arc::new(PgCommunityRepository::new(pool)),
            forum,
        }
    }

    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            votes: store.clone(),
            communities: store,
            forum: ForumConfig::default(),
        }
    }

    pub fn identity(&self) -> IdentityService {
        IdentityService::new(self.users.clone())
    }

    pub fn tree_builder(&self) -> CommentTreeBuilder {
        CommentTreeBuilder::new(self.posts.clone(), self.comments.clone(), self.votes.clone())
    }

    pub fn vote_service(&self) -> VoteService {
        VoteService::new(self.votes.clone())
    }

    pub fn comment_service(&self) -> CommentService {
        CommentService::new(
            self.posts.clone(),
            self.comments.clone(),
            self.forum.max_content_len,
        )
    }

    pub fn post_service(&self) -> PostService {
        PostService::new(
            self.posts.clone(),
            self.communities.clone(),
            self.votes.clone(),
            self.forum.clone(),
        )
    }

    pub fn community_service(&self) -> CommunityService {
        CommunityService::new(self.communities.clone(), self.post_service())
    }

    pub fn search_service(&self) -> SearchService {
        SearchService::new(self.posts.clone(), self.comments.clone(), self.post_service())
    }
}
