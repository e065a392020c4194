use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::require_user;
use crate::db::VoteLedger;
use crate::error::Result;
use crate::metrics::forum as metrics;
use crate::models::{TargetKind, VoteDirection, VoteTarget, VoteValue};

/// State of a target after a vote request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteSummary {
    pub target: TargetKind,
    pub id: Uuid,
    /// Aggregate counter after the request
    pub votes: i64,
    /// The caller's recorded vote
    pub user_vote: VoteValue,
}

/// Vote mutator for posts and comments
#[derive(Clone)]
pub struct VoteService {
    ledger: Arc<dyn VoteLedger>,
}

impl VoteService {
    pub fn new(ledger: Arc<dyn VoteLedger>) -> Self {
        Self { ledger }
    }

    /// Set the caller's vote on `target` to `direction`.
    ///
    /// Repeating the same direction is a no-op; switching direction moves the
    /// aggregate by two. The ledger applies record and counter together.
    pub async fn apply_vote(
        &self,
        user_id: Option<Uuid>,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteSummary> {
        let user_id = require_user(user_id)?;

        let outcome = self
            .ledger
            .record_vote(user_id, target, direction.value())
            .await?;

        metrics::record_vote(target.kind(), &outcome);
        tracing::info!(
            %user_id,
            %target,
            direction = direction.as_str(),
            changed = outcome.changed(),
            votes = outcome.aggregate,
            "vote applied"
        );

        Ok(VoteSummary {
            target: target.kind(),
            id: target.id(),
            votes: outcome.aggregate,
            user_vote: outcome.current,
        })
    }

    pub async fn current_vote(&self, user_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        self.ledger.get_vote(user_id, target).await
    }
}
