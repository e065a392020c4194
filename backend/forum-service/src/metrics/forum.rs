use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

use crate::models::{TargetKind, VoteOutcome};

lazy_static! {
    /// Vote requests by target kind and outcome (changed, unchanged).
    pub static ref VOTES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "forum_votes_total",
        "Vote requests segmented by target kind and outcome",
        &["target", "outcome"]
    )
    .expect("failed to register forum_votes_total");

    /// Wall time spent assembling one comment tree.
    pub static ref COMMENT_TREE_BUILD_SECONDS: Histogram = register_histogram!(
        "forum_comment_tree_build_seconds",
        "Comment tree build duration"
    )
    .expect("failed to register forum_comment_tree_build_seconds");

    /// Nodes per built comment tree.
    pub static ref COMMENT_TREE_NODES: Histogram = register_histogram!(
        "forum_comment_tree_nodes",
        "Number of comments in a built tree",
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 10_000.0]
    )
    .expect("failed to register forum_comment_tree_nodes");

    /// Comment rows removed by cascade deletes.
    pub static ref COMMENTS_DELETED_TOTAL: IntCounter = register_int_counter!(
        "forum_comments_deleted_total",
        "Comment rows removed by cascade deletes"
    )
    .expect("failed to register forum_comments_deleted_total");
}

pub fn record_vote(kind: TargetKind, outcome: &VoteOutcome) {
    let label = if outcome.changed() { "changed" } else { "unchanged" };
    VOTES_TOTAL.with_label_values(&[kind.as_str(), label]).inc();
}

pub fn record_tree_build(nodes: usize, seconds: f64) {
    COMMENT_TREE_BUILD_SECONDS.observe(seconds);
    COMMENT_TREE_NODES.observe(nodes as f64);
}

pub fn record_comments_deleted(count: u64) {
    COMMENTS_DELETED_TOTAL.inc_by(count);
}
