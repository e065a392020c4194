use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{optional_text, require_text, require_user, PostService};
use crate::db::CommunityStore;
use crate::error::{AppError, Result};
use crate::models::{Community, CommunitySummary, PostView, MAX_COMMUNITY_NAME_LEN};

/// Subscription state after a subscribe/unsubscribe request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionState {
    pub community_id: Uuid,
    pub subscribed: bool,
    pub subs_count: i64,
}

#[derive(Clone)]
pub struct CommunityService {
    communities: Arc<dyn CommunityStore>,
    posts: PostService,
}

impl CommunityService {
    pub fn new(communities: Arc<dyn CommunityStore>, posts: PostService) -> Self {
        Self { communities, posts }
    }

    pub async fn list_communities(&self) -> Result<Vec<CommunitySummary>> {
        self.communities.list_communities().await
    }

    pub async fn get_community(&self, community_id: Uuid) -> Result<CommunitySummary> {
        self.communities
            .get_community(community_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))
    }

    pub async fn create_community(
        &self,
        name: &str,
        avatar: Option<&str>,
        banner: Option<&str>,
    ) -> Result<Community> {
        let name = require_text("name", name, MAX_COMMUNITY_NAME_LEN)?;
        let avatar = optional_text(avatar);
        let banner = optional_text(banner);

        let community = self
            .communities
            .create_community(&name, avatar.as_deref(), banner.as_deref())
            .await?;

        tracing::info!(community_id = %community.id, %name, "community created");
        Ok(community)
    }

    /// Posts of a community, newest first, each with all of its communities
    pub async fn community_posts(
        &self,
        viewer: Option<Uuid>,
        community_id: Uuid,
    ) -> Result<Vec<PostView>> {
        self.get_community(community_id).await?;
        let posts = self.communities.community_posts(community_id).await?;
        self.posts.views(viewer, posts).await
    }

    /// Idempotent subscribe (`true`) or unsubscribe (`false`)
    pub async fn set_subscription(
        &self,
        user_id: Option<Uuid>,
        community_id: Uuid,
        subscribed: bool,
    ) -> Result<SubscriptionState> {
        let user_id = require_user(user_id)?;
        self.get_community(community_id).await?;

        let changed = self
            .communities
            .set_subscription(community_id, user_id, subscribed)
            .await?;
        if changed {
            tracing::info!(%community_id, %user_id, subscribed, "subscription changed");
        }

        let community = self.get_community(community_id).await?;
        Ok(SubscriptionState {
            community_id,
            subscribed,
            subs_count: community.subs_count,
        })
    }
}
