use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Post, VoteValue};

/// Community row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
}

/// Community with real aggregate counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommunitySummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub subs_count: i64,
    pub posts_count: i64,
    pub comments_count: i64,
}

/// Post as served to a viewer: every community it belongs to plus the viewer's vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub communities: Vec<CommunitySummary>,
    pub user_vote: VoteValue,
}
