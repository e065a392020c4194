/// Comment tree builder
///
/// Walks a post's comments level by level (one batched replies query per
/// level) into an arena, orders every children list with the requested
/// policy, then assembles `CommentNode`s bottom-up. Nothing recurses on
/// depth, so reply chains of any length are safe.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::db::{CommentStore, PostStore, VoteLedger};
use crate::error::{AppError, Result};
use crate::metrics::forum as metrics;
use crate::models::{Comment, CommentNode, SortOrder, TargetKind, VoteValue};

struct Slot {
    comment: Comment,
    children: Vec<usize>,
}

/// Flat storage for one tree; children always sit at higher indices than their parent
#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    index: HashMap<Uuid, usize>,
}

impl Arena {
    fn push(&mut self, comment: Comment) -> usize {
        let idx = self.slots.len();
        self.index.insert(comment.id, idx);
        self.slots.push(Slot {
            comment,
            children: Vec::new(),
        });
        idx
    }

    /// Attach a reply under its already-placed parent
    fn attach(&mut self, reply: Comment) -> Option<usize> {
        let parent_idx = *self.index.get(&reply.parent_id?)?;
        if self.index.contains_key(&reply.id) {
            return None;
        }
        let idx = self.push(reply);
        self.slots[parent_idx].children.push(idx);
        Some(idx)
    }

    fn ids(&self) -> Vec<Uuid> {
        self.slots.iter().map(|slot| slot.comment.id).collect()
    }

    fn sort_children(&mut self, order: SortOrder) {
        for idx in 0..self.slots.len() {
            let mut children = std::mem::take(&mut self.slots[idx].children);
            children.sort_by(|&a, &b| {
                order.compare(&self.slots[a].comment, &self.slots[b].comment)
            });
            self.slots[idx].children = children;
        }
    }

    /// Consume the arena into nodes, deepest first; returns the nodes for `roots`
    fn assemble(
        mut self,
        roots: &[usize],
        overlay: &HashMap<Uuid, VoteValue>,
    ) -> Result<Vec<CommentNode>> {
        let mut built: Vec<Option<CommentNode>> = (0..self.slots.len()).map(|_| None).collect();

        while let Some(slot) = self.slots.pop() {
            let idx = self.slots.len();
            let replies = slot
                .children
                .iter()
                .map(|&child| take_built(&mut built, child))
                .collect::<Result<Vec<_>>>()?;
            let user_vote = overlay.get(&slot.comment.id).copied().unwrap_or_default();
            built[idx] = Some(CommentNode::from_comment(slot.comment, user_vote, replies));
        }

        roots
            .iter()
            .map(|&root| take_built(&mut built, root))
            .collect()
    }
}

fn take_built(built: &mut [Option<CommentNode>], idx: usize) -> Result<CommentNode> {
    built
        .get_mut(idx)
        .and_then(Option::take)
        .ok_or_else(|| AppError::Internal(format!("comment tree slot {} assembled twice", idx)))
}

/// Builds comment forests and listings for the presentation layer
#[derive(Clone)]
pub struct CommentTreeBuilder {
    posts: Arc<dyn PostStore>,
    comments: Arc<dyn CommentStore>,
    votes: Arc<dyn VoteLedger>,
}

impl CommentTreeBuilder {
    pub fn new(
        posts: Arc<dyn PostStore>,
        comments: Arc<dyn CommentStore>,
        votes: Arc<dyn VoteLedger>,
    ) -> Self {
        Self {
            posts,
            comments,
            votes,
        }
    }

    /// Full comment forest of a post, `order` applied at every level
    pub async fn build_tree(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
        order: SortOrder,
    ) -> Result<Vec<CommentNode>> {
        let started = Instant::now();
        self.ensure_post(post_id).await?;

        let mut arena = Arena::default();
        let mut roots = Vec::new();
        let mut frontier = Vec::new();

        for comment in self.comments.list_root_comments(post_id, order).await? {
            frontier.push(comment.id);
            roots.push(arena.push(comment));
        }

        while !frontier.is_empty() {
            let replies = self.comments.list_replies_for(&frontier).await?;
            frontier = Vec::with_capacity(replies.len());

            for reply in replies {
                let reply_id = reply.id;
                if arena.attach(reply).is_some() {
                    frontier.push(reply_id);
                }
            }
        }

        roots.sort_by(|&a, &b| order.compare(&arena.slots[a].comment, &arena.slots[b].comment));
        arena.sort_children(order);

        let overlay = self.overlay(viewer, &arena.ids()).await?;
        let node_count = arena.slots.len();
        let tree = arena.assemble(&roots, &overlay)?;

        metrics::record_tree_build(node_count, started.elapsed().as_secs_f64());
        tracing::debug!(
            %post_id,
            order = order.as_str(),
            nodes = node_count,
            "comment tree built"
        );

        Ok(tree)
    }

    /// Root comments only, each with empty `replies`
    pub async fn root_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
        order: SortOrder,
    ) -> Result<Vec<CommentNode>> {
        self.ensure_post(post_id).await?;

        let mut roots = self.comments.list_root_comments(post_id, order).await?;
        order.sort(&mut roots);

        let ids: Vec<Uuid> = roots.iter().map(|c| c.id).collect();
        let overlay = self.overlay(viewer, &ids).await?;

        Ok(roots
            .into_iter()
            .map(|comment| {
                let user_vote = overlay.get(&comment.id).copied().unwrap_or_default();
                CommentNode::from_comment(comment, user_vote, Vec::new())
            })
            .collect())
    }

    /// Every comment of a post as flat rows, oldest first
    pub async fn flat_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.ensure_post(post_id).await?;
        self.comments.list_post_comments(post_id).await
    }

    async fn ensure_post(&self, post_id: Uuid) -> Result<()> {
        match self.posts.get_post(post_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("post {}", post_id))),
        }
    }

    async fn overlay(
        &self,
        viewer: Option<Uuid>,
        comment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>> {
        match viewer {
            Some(user_id) if !comment_ids.is_empty() => {
                self.votes
                    .votes_for(user_id, TargetKind::Comment, comment_ids)
                    .await
            }
            _ => Ok(HashMap::new()),
        }
    }
}
