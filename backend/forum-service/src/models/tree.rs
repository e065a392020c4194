use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Comment, VoteValue};

/// A comment with its viewer overlay and ordered replies.
///
/// Not `Serialize`: a derived impl would recurse once per nesting level.
/// Use [`CommentNode::forest_json`] to encode responses.
#[derive(Debug)]
pub struct CommentNode {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    pub published_date: DateTime<Utc>,
    pub votes: i64,
    pub image: Option<String>,
    /// Viewer's own vote; 0 when anonymous or never voted
    pub user_vote: VoteValue,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn from_comment(comment: Comment, user_vote: VoteValue, replies: Vec<CommentNode>) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            content: comment.content,
            published_date: comment.published_at,
            votes: comment.votes,
            image: comment.image,
            user_vote,
            replies,
        }
    }

    /// Encode a forest as a JSON array.
    ///
    /// Leaf fields go through serde; nesting is driven by an explicit stack of
    /// open `replies` arrays, so depth never touches the call stack.
    pub fn forest_json(forest: &[CommentNode]) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(forest.len() * 192 + 2);
        let mut open: Vec<(std::slice::Iter<'_, CommentNode>, bool)> = vec![(forest.iter(), true)];
        out.push(b'[');

        while let Some((siblings, first)) = open.last_mut() {
            match siblings.next() {
                Some(node) => {
                    if !*first {
                        out.push(b',');
                    }
                    *first = false;
                    node.write_head(&mut out)?;
                    open.push((node.replies.iter(), true));
                }
                None => {
                    open.pop();
                    if open.is_empty() {
                        out.push(b']');
                    } else {
                        out.extend_from_slice(b"]}");
                    }
                }
            }
        }

        Ok(out)
    }

    /// Writes `{...fields...,"replies":[`; the caller closes both
    fn write_head(&self, out: &mut Vec<u8>) -> serde_json::Result<()> {
        let head = serde_json::to_vec(&NodeHead {
            id: &self.id,
            author: &self.author,
            content: &self.content,
            published_date: &self.published_date,
            votes: self.votes,
            image: self.image.as_deref(),
            user_vote: self.user_vote,
        })?;
        // serde_json always closes a struct with a single `}`
        out.extend_from_slice(&head[..head.len() - 1]);
        out.extend_from_slice(b",\"replies\":[");
        Ok(())
    }

    /// Number of nodes in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

#[derive(Serialize)]
struct NodeHead<'a> {
    id: &'a Uuid,
    author: &'a str,
    content: &'a str,
    published_date: &'a DateTime<Utc>,
    votes: i64,
    image: Option<&'a str>,
    user_vote: VoteValue,
}

// Reply chains can be arbitrarily deep; the derived drop would recurse once per level.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}
