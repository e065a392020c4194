//! Shared fixtures for forum-service integration tests
//!
//! Builds an `AppState` over the in-memory store and seeds users, posts and
//! comments either through the services or as raw rows with fixed votes and
//! timestamps.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use forum_service::db::{MemoryStore, PostStore};
use forum_service::models::{Comment, NewPost, Post, User};
use forum_service::services::CreateComment;
use forum_service::AppState;
use uuid::Uuid;

pub struct Forum {
    pub store: MemoryStore,
    pub state: AppState,
}

pub fn forum() -> Forum {
    let store = MemoryStore::new();
    let state = AppState::memory(store.clone());
    Forum { store, state }
}

/// API key used for a fixture user
pub fn api_key(username: &str) -> String {
    format!("key-{}", username)
}

/// 2024-01-01 at the given hour and minute, UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

impl Forum {
    pub async fn user(&self, username: &str) -> User {
        self.store.add_user(username, &api_key(username)).await
    }

    pub async fn post(&self, author: &User) -> Post {
        self.post_with_url(author, None).await
    }

    pub async fn post_with_url(&self, author: &User, url: Option<&str>) -> Post {
        self.store
            .insert_post(&NewPost {
                author_id: author.id,
                title: "A post".to_string(),
                content: "Post body".to_string(),
                url: url.map(str::to_string),
                image: None,
                community_ids: Vec::new(),
            })
            .await
            .unwrap()
    }

    /// Comment created through the service, with a real timestamp
    pub async fn comment(
        &self,
        author: &User,
        post: &Post,
        parent: Option<&Comment>,
        content: &str,
    ) -> Comment {
        self.state
            .comment_service()
            .create_comment(
                Some(author.id),
                post.id,
                CreateComment {
                    content: content.to_string(),
                    parent_id: parent.map(|c| c.id),
                    image: None,
                },
            )
            .await
            .unwrap()
    }

    /// Raw comment row with fixed votes and timestamp
    pub async fn seeded_comment(
        &self,
        author: &User,
        post: &Post,
        parent: Option<&Comment>,
        votes: i64,
        published_at: DateTime<Utc>,
    ) -> Comment {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: post.id,
            parent_id: parent.map(|c| c.id),
            author_id: author.id,
            author: author.username.clone(),
            content: format!("votes={} at={}", votes, published_at),
            url: post.url.clone(),
            image: None,
            votes,
            published_at,
        };
        self.store.insert_comment_row(comment.clone()).await;
        comment
    }
}
