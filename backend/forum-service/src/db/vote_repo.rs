use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::VoteLedger;
use crate::error::{AppError, Result};
use crate::models::{TargetKind, VoteOutcome, VoteTarget, VoteValue};

/// Table layout for one kind of vote target
struct LedgerTables {
    /// Vote record table
    votes: &'static str,
    /// Foreign key column in the vote record table
    target_column: &'static str,
    /// Table holding the denormalized `votes` counter
    counter: &'static str,
}

fn tables(kind: TargetKind) -> LedgerTables {
    match kind {
        TargetKind::Post => LedgerTables {
            votes: "post_votes",
            target_column: "post_id",
            counter: "posts",
        },
        TargetKind::Comment => LedgerTables {
            votes: "comment_votes",
            target_column: "comment_id",
            counter: "comments",
        },
    }
}

/// Repository for post and comment vote records
#[derive(Clone)]
pub struct PgVoteRepository {
    pool: PgPool,
}

impl PgVoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Ensure a record exists, then lock it; returns the stored value.
///
/// Concurrent writers for the same (user, target) block here until the
/// holder of the row lock commits.
async fn upsert_vote(conn: &mut PgConnection, user_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
    let t = tables(target.kind());

    sqlx::query(&format!(
        r#"
        INSERT INTO {votes} (user_id, {col}, value)
        VALUES ($1, $2, 0)
        ON CONFLICT (user_id, {col}) DO NOTHING
        "#,
        votes = t.votes,
        col = t.target_column
    ))
    .bind(user_id)
    .bind(target.id())
    .execute(&mut *conn)
    .await?;

    let stored: i16 = sqlx::query_scalar(&format!(
        "SELECT value FROM {votes} WHERE user_id = $1 AND {col} = $2 FOR UPDATE",
        votes = t.votes,
        col = t.target_column
    ))
    .bind(user_id)
    .bind(target.id())
    .fetch_one(&mut *conn)
    .await?;

    VoteValue::try_from(stored)
}

async fn set_vote(
    conn: &mut PgConnection,
    user_id: Uuid,
    target: VoteTarget,
    value: VoteValue,
) -> Result<()> {
    let t = tables(target.kind());

    sqlx::query(&format!(
        r#"
        UPDATE {votes}
        SET value = $3, updated_at = NOW()
        WHERE user_id = $1 AND {col} = $2
        "#,
        votes = t.votes,
        col = t.target_column
    ))
    .bind(user_id)
    .bind(target.id())
    .bind(value.as_i16())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// In-place increment; the row lock taken by UPDATE serializes writers across users.
async fn adjust_aggregate(conn: &mut PgConnection, target: VoteTarget, delta: i64) -> Result<i64> {
    let t = tables(target.kind());

    let aggregate: i64 = sqlx::query_scalar(&format!(
        "UPDATE {} SET votes = votes + $2 WHERE id = $1 RETURNING votes",
        t.counter
    ))
    .bind(target.id())
    .bind(delta)
    .fetch_one(&mut *conn)
    .await?;

    Ok(aggregate)
}

#[async_trait]
impl VoteLedger for PgVoteRepository {
    async fn get_vote(&self, user_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        let t = tables(target.kind());

        let stored: Option<i16> = sqlx::query_scalar(&format!(
            "SELECT value FROM {} WHERE user_id = $1 AND {} = $2",
            t.votes, t.target_column
        ))
        .bind(user_id)
        .bind(target.id())
        .fetch_optional(&self.pool)
        .await?;

        stored.map_or(Ok(VoteValue::Neutral), VoteValue::try_from)
    }

    async fn votes_for(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let t = tables(kind);
        let rows: Vec<(Uuid, i16)> = sqlx::query_as(&format!(
            r#"
            SELECT {col}, value
            FROM {votes}
            WHERE user_id = $1 AND {col} = ANY($2) AND value <> 0
            "#,
            votes = t.votes,
            col = t.target_column
        ))
        .bind(user_id)
        .bind(target_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, value)| VoteValue::try_from(value).map(|vote| (id, vote)))
            .collect()
    }

    async fn get_aggregate(&self, target: VoteTarget) -> Result<Option<i64>> {
        let t = tables(target.kind());

        let aggregate: Option<i64> =
            sqlx::query_scalar(&format!("SELECT votes FROM {} WHERE id = $1", t.counter))
                .bind(target.id())
                .fetch_optional(&self.pool)
                .await?;

        Ok(aggregate)
    }

    async fn record_vote(
        &self,
        user_id: Uuid,
        target: VoteTarget,
        value: VoteValue,
    ) -> Result<VoteOutcome> {
        let t = tables(target.kind());
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            t.counter
        ))
        .bind(target.id())
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound(format!("{} {}", target.kind().as_str(), target.id())));
        }

        let previous = upsert_vote(&mut tx, user_id, target).await?;

        let aggregate = if previous == value {
            sqlx::query_scalar::<_, i64>(&format!("SELECT votes FROM {} WHERE id = $1", t.counter))
                .bind(target.id())
                .fetch_one(&mut *tx)
                .await?
        } else {
            set_vote(&mut tx, user_id, target, value).await?;
            adjust_aggregate(&mut tx, target, value.delta_from(previous)).await?
        };

        tx.commit().await?;

        Ok(VoteOutcome {
            previous,
            current: value,
            aggregate,
        })
    }
}
