//! Integration Tests: Comment Tree Builder
//!
//! Coverage:
//! - top/new/old ordering at the root and at every nested level
//! - viewer vote overlay (anonymous viewers see 0 everywhere)
//! - empty posts, unknown posts, root-only and flat listings
//! - very deep reply chains

mod common;

use common::{at, forum};
use forum_service::models::{CommentNode, SortOrder, VoteDirection, VoteTarget, VoteValue};
use forum_service::AppError;
use uuid::Uuid;

fn ids(nodes: &[CommentNode]) -> Vec<Uuid> {
    nodes.iter().map(|n| n.id).collect()
}

/// Every replies list in the forest, root list included
fn sibling_lists(forest: &[CommentNode]) -> Vec<&[CommentNode]> {
    let mut lists = vec![forest];
    let mut stack: Vec<&CommentNode> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        lists.push(&node.replies);
        stack.extend(node.replies.iter());
    }
    lists
}

#[tokio::test]
async fn test_root_ordering_scenario() {
    let forum = forum();
    let alice = forum.user("alice").await;
    let post = forum.post(&alice).await;

    let a = forum.seeded_comment(&alice, &post, None, 5, at(10, 0)).await;
    let b = forum.seeded_comment(&alice, &post, None, 5, at(11, 0)).await;
    let c = forum.seeded_comment(&alice, &post, None, 2, at(12, 0)).await;

    let builder = forum.state.tree_builder();

    let top = builder.build_tree(post.id, None, SortOrder::Top).await.unwrap();
    assert_eq!(ids(&top), vec![b.id, a.id, c.id]);

    let old = builder.build_tree(post.id, None, SortOrder::Old).await.unwrap();
    assert_eq!(ids(&old), vec![a.id, b.id, c.id]);

    let new = builder.build_tree(post.id, None, SortOrder::New).await.unwrap();
    assert_eq!(ids(&new), vec![c.id, b.id, a.id]);

    let roots = builder
        .root_comments(post.id, None, SortOrder::Top)
        .await
        .unwrap();
    assert_eq!(ids(&roots), vec![b.id, a.id, c.id]);
}

#[tokio::test]
async fn test_ordering_applies_at_every_depth() {
    let forum = forum();
    let alice = forum.user("alice").await;
    let post = forum.post(&alice).await;

    // Three levels, each sibling group seeded out of order on purpose
    let root = forum.seeded_comment(&alice, &post, None, 0, at(8, 0)).await;
    let mut second_level = Vec::new();
    for (votes, minute) in [(1, 30), (9, 10), (9, 20), (4, 0)] {
        second_level.push(
            forum
                .seeded_comment(&alice, &post, Some(&root), votes, at(9, minute))
                .await,
        );
    }
    for parent in &second_level {
        for (votes, minute) in [(3, 50), (7, 5), (3, 40), (0, 1)] {
            forum
                .seeded_comment(&alice, &post, Some(parent), votes, at(10, minute))
                .await;
        }
    }

    let builder = forum.state.tree_builder();

    let old = builder.build_tree(post.id, None, SortOrder::Old).await.unwrap();
    assert_eq!(old[0].subtree_len(), 21);
    for list in sibling_lists(&old) {
        assert!(list
            .windows(2)
            .all(|pair| pair[0].published_date <= pair[1].published_date));
    }

    let top = builder.build_tree(post.id, None, SortOrder::Top).await.unwrap();
    for list in sibling_lists(&top) {
        assert!(list.windows(2).all(|pair| {
            (-pair[0].votes, std::cmp::Reverse(pair[0].published_date))
                <= (-pair[1].votes, std::cmp::Reverse(pair[1].published_date))
        }));
    }
    let second: Vec<i64> = top[0].replies.iter().map(|n| n.votes).collect();
    assert_eq!(second, vec![9, 9, 4, 1]);

    let new = builder.build_tree(post.id, None, SortOrder::New).await.unwrap();
    for list in sibling_lists(&new) {
        assert!(list
            .windows(2)
            .all(|pair| pair[0].published_date >= pair[1].published_date));
    }
}

#[tokio::test]
async fn test_empty_post_yields_empty_forest() {
    let forum = forum();
    let alice = forum.user("alice").await;
    let post = forum.post(&alice).await;

    let tree = forum
        .state
        .tree_builder()
        .build_tree(post.id, Some(alice.id), SortOrder::Top)
        .await
        .unwrap();
    assert!(tree.is_empty());
}

#[tokio::test]
async fn test_unknown_post_is_not_found() {
    let forum = forum();
    let builder = forum.state.tree_builder();

    let err = builder
        .build_tree(Uuid::new_v4(), None, SortOrder::Top)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = builder.flat_comments(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_vote_overlay_follows_viewer() {
    let forum = forum();
    let alice = forum.user("alice").await;
    let bob = forum.user("bob").await;
    let post = forum.post(&alice).await;

    let root = forum.comment(&alice, &post, None, "root").await;
    let reply = forum.comment(&bob, &post, Some(&root), "reply").await;
    let nested = forum.comment(&alice, &post, Some(&reply), "nested").await;

    let votes = forum.state.vote_service();
    votes
        .apply_vote(Some(bob.id), VoteTarget::Comment(nested.id), VoteDirection::Up)
        .await
        .unwrap();
    votes
        .apply_vote(Some(bob.id), VoteTarget::Comment(root.id), VoteDirection::Down)
        .await
        .unwrap();

    let builder = forum.state.tree_builder();

    let as_bob = builder
        .build_tree(post.id, Some(bob.id), SortOrder::Top)
        .await
        .unwrap();
    assert_eq!(as_bob[0].user_vote, VoteValue::Down);
    assert_eq!(as_bob[0].replies[0].user_vote, VoteValue::Neutral);
    assert_eq!(as_bob[0].replies[0].replies[0].user_vote, VoteValue::Up);
    assert_eq!(as_bob[0].replies[0].replies[0].votes, 1);

    let anonymous = builder.build_tree(post.id, None, SortOrder::Top).await.unwrap();
    for list in sibling_lists(&anonymous) {
        assert!(list.iter().all(|n| n.user_vote == VoteValue::Neutral));
    }

    let as_alice = builder
        .build_tree(post.id, Some(alice.id), SortOrder::Top)
        .await
        .unwrap();
    assert_eq!(as_alice[0].replies[0].replies[0].user_vote, VoteValue::Neutral);
}

#[tokio::test]
async fn test_root_listing_has_no_replies_and_flat_listing_is_oldest_first() {
    let forum = forum();
    let alice = forum.user("alice").await;
    let post = forum.post(&alice).await;

    let first = forum.seeded_comment(&alice, &post, None, 0, at(9, 0)).await;
    let reply = forum
        .seeded_comment(&alice, &post, Some(&first), 3, at(9, 30))
        .await;
    let second = forum.seeded_comment(&alice, &post, None, 1, at(10, 0)).await;

    let builder = forum.state.tree_builder();

    let roots = builder
        .root_comments(post.id, None, SortOrder::Old)
        .await
        .unwrap();
    assert_eq!(ids(&roots), vec![first.id, second.id]);
    assert!(roots.iter().all(|n| n.replies.is_empty()));

    let flat = builder.flat_comments(post.id).await.unwrap();
    let flat_ids: Vec<Uuid> = flat.iter().map(|c| c.id).collect();
    assert_eq!(flat_ids, vec![first.id, reply.id, second.id]);
}

#[tokio::test]
async fn test_deep_reply_chain_builds_and_drops() {
    const DEPTH: usize = 10_000;

    let forum = forum();
    let alice = forum.user("alice").await;
    let post = forum.post(&alice).await;

    let mut parent = forum.seeded_comment(&alice, &post, None, 0, at(0, 0)).await;
    for _ in 1..DEPTH {
        parent = forum
            .seeded_comment(&alice, &post, Some(&parent), 0, at(1, 0))
            .await;
    }

    let tree = forum
        .state
        .tree_builder()
        .build_tree(post.id, Some(alice.id), SortOrder::Top)
        .await
        .unwrap();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].subtree_len(), DEPTH);

    let mut depth = 1;
    let mut node = &tree[0];
    while let Some(child) = node.replies.first() {
        depth += 1;
        node = child;
    }
    assert_eq!(depth, DEPTH);
    assert_eq!(node.id, parent.id);

    drop(tree);
}
