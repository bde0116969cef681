//! Threads a flat comment list for display.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::comment::Comment;

/// A comment with its direct replies, in the order they were fetched.
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

/// How many levels replies nest below a top-level comment. A reply to a comment at
/// this depth is shown next to its parent instead of below it.
pub const MAX_REPLY_DEPTH: usize = 5;

/// Buckets `comments` by `parent_id` in one pass and returns the parentless ones as roots.
///
/// Ordering inside every level follows the input. Replies whose parent is not in the
/// input (deleted or unapproved) are dropped together with their own replies. The
/// walk uses an explicit stack, and nesting stops at [`MAX_REPLY_DEPTH`], so a long
/// reply chain neither grows the call stack here nor when the forest is rendered.
pub fn build_forest(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut roots = Vec::new();
    let mut replies: HashMap<i64, Vec<usize>> = HashMap::new();

    for (idx, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            Some(parent_id) => replies.entry(parent_id).or_default().push(idx),
            None => roots.push(idx),
        }
    }

    // (index, display depth, index of the node it is shown under)
    let mut placed: Vec<(usize, usize, Option<usize>)> = Vec::with_capacity(comments.len());
    let mut stack: Vec<(usize, usize, Option<usize>)> =
        roots.iter().map(|&idx| (idx, 0, None)).collect();

    while let Some((idx, depth, anchor)) = stack.pop() {
        placed.push((idx, depth, anchor));
        let (child_depth, child_anchor) = if depth < MAX_REPLY_DEPTH {
            (depth + 1, Some(idx))
        } else {
            (depth, anchor)
        };
        if let Some(children) = replies.remove(&comments[idx].id) {
            stack.extend(children.into_iter().map(|child| (child, child_depth, child_anchor)));
        }
    }

    let mut children_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(idx, _, anchor) in &placed {
        if let Some(anchor) = anchor {
            children_of.entry(anchor).or_default().push(idx);
        }
    }
    for children in children_of.values_mut() {
        children.sort_unstable();
    }

    // Children always sit one level below their anchor, so building the deepest level
    // first means every child node exists before its parent needs it.
    placed.sort_by(|a, b| b.1.cmp(&a.1));

    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = pending.iter().map(|_| None).collect();

    for (idx, _, _) in placed {
        let children = children_of
            .remove(&idx)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|child| built[child].take())
            .collect();
        if let Some(comment) = pending[idx].take() {
            built[idx] = Some(CommentNode { comment, children });
        }
    }

    roots
        .into_iter()
        .filter_map(|idx| built[idx].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::CommentStatus;
    use chrono::Utc;

    fn comment(id: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            post_id: 1,
            author_id: Some(10),
            author_name: Some("Vi Ewer".into()),
            body: format!("comment {id}"),
            status: CommentStatus::Approved,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.comment.id).collect()
    }

    #[test]
    fn parentless_comments_become_roots_in_input_order() {
        let forest = build_forest(vec![comment(3, None), comment(2, None), comment(1, None)]);
        assert_eq!(ids(&forest), vec![3, 2, 1]);
        assert!(forest.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn replies_nest_under_their_parents_at_any_depth() {
        // Newest first, as fetched: replies can precede or follow their parent.
        let forest = build_forest(vec![
            comment(6, Some(4)),
            comment(5, Some(1)),
            comment(4, Some(1)),
            comment(3, None),
            comment(2, Some(1)),
            comment(1, None),
        ]);

        assert_eq!(ids(&forest), vec![3, 1]);
        let first = &forest[1];
        assert_eq!(ids(&first.children), vec![5, 4, 2]);
        assert_eq!(ids(&first.children[1].children), vec![6]);
    }

    #[test]
    fn replies_to_missing_parents_are_hidden() {
        let forest = build_forest(vec![comment(9, Some(99)), comment(8, Some(9)), comment(1, None)]);
        assert_eq!(ids(&forest), vec![1]);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn long_reply_chains_flatten_below_the_depth_cap() {
        const CHAIN: i64 = 2_000;
        // Newest first, each comment replying to the one before it.
        let chain = (1..=CHAIN)
            .rev()
            .map(|id| comment(id, (id > 1).then(|| id - 1)))
            .collect();

        let forest = build_forest(chain);
        assert_eq!(ids(&forest), vec![1]);

        let mut node = &forest[0];
        for depth in 1..MAX_REPLY_DEPTH {
            assert_eq!(ids(&node.children), vec![depth as i64 + 1]);
            node = &node.children[0];
        }

        // Everything past the cap lines up under the last nested comment, newest first.
        let last_nested = MAX_REPLY_DEPTH as i64;
        assert_eq!(node.comment.id, last_nested);
        let expected: Vec<i64> = (last_nested + 1..=CHAIN).rev().collect();
        assert_eq!(ids(&node.children), expected);
        assert!(node.children.iter().all(|n| n.children.is_empty()));

        let value = minijinja::Value::from_serialize(&forest[0]);
        assert_eq!(value.get_attr("id").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn nodes_serialize_flat_with_children() {
        let forest = build_forest(vec![comment(2, Some(1)), comment(1, None)]);
        let value = minijinja::Value::from_serialize(&forest[0]);
        assert_eq!(value.get_attr("body").unwrap().as_str(), Some("comment 1"));
        let children = value.get_attr("children").unwrap();
        assert_eq!(children.len(), Some(1));
    }
}
