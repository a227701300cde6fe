//! Hydrated comment trees assembled from flat table rows.
//!
//! Reads return [`CommentThread`] values: a comment plus its optional
//! relations and its non-deleted replies, recursively. Assembly works on
//! flat row vectors indexed by parent id rather than on linked object
//! graphs, so the tree shape is a pure function of the rows and can be
//! tested without a database.

use std::collections::HashMap;

use crate::model::{Article, Comment, User};

/// A comment with its hydrated relations and reply subtree.
///
/// The optional relations are set deliberately by each query path: `article`
/// is attached only where the query carried the article id for that node
/// (top-level nodes; child nodes rely on the caller already holding the
/// article), `author` wherever the row carried a user id.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentThread {
    /// The comment row itself.
    pub comment: Comment,
    /// Owning article, when hydrated by the query path.
    pub article: Option<Article>,
    /// Authoring user, when hydrated by the query path.
    pub author: Option<User>,
    /// Non-deleted replies, ascending by id, each with its own subtree.
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Wraps a bare row with no relations and no replies.
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            article: None,
            author: None,
            replies: Vec::new(),
        }
    }

    /// Returns the number of comments in this subtree, including the root.
    pub fn total_comments(&self) -> usize {
        1 + self
            .replies
            .iter()
            .map(CommentThread::total_comments)
            .sum::<usize>()
    }
}

/// Assembles threads from root rows and their (transitive) reply rows.
///
/// `replies` holds every descendant row, already filtered and ordered by the
/// queries that fetched them; relative order of rows sharing a parent is
/// preserved. Rows whose parent is missing from the input are dropped.
pub fn build_threads(roots: Vec<Comment>, replies: Vec<Comment>) -> Vec<CommentThread> {
    let mut by_parent: HashMap<i32, Vec<Comment>> = HashMap::with_capacity(replies.len());
    for reply in replies {
        by_parent.entry(reply.parent_id).or_default().push(reply);
    }

    roots
        .into_iter()
        .map(|root| assemble(root, &mut by_parent))
        .collect()
}

fn assemble(comment: Comment, by_parent: &mut HashMap<i32, Vec<Comment>>) -> CommentThread {
    // Removing the bucket hands each row to exactly one parent, which also
    // terminates on malformed parent cycles.
    let replies = by_parent
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| assemble(reply, by_parent))
        .collect();

    CommentThread {
        comment,
        article: None,
        author: None,
        replies,
    }
}

/// Collects the distinct author ids appearing anywhere in the given threads.
pub fn collect_author_ids(threads: &[CommentThread]) -> Vec<i32> {
    let mut seen = Vec::new();
    let mut stack: Vec<&CommentThread> = threads.iter().collect();

    while let Some(thread) = stack.pop() {
        if !seen.contains(&thread.comment.author_id) {
            seen.push(thread.comment.author_id);
        }
        stack.extend(thread.replies.iter());
    }

    seen
}

/// Attaches authors to every node of the given threads.
///
/// Fails with the offending user id when a row references an author missing
/// from the lookup map; resolving a comment's author is part of the read
/// contract, so an unresolvable id fails the whole operation.
pub fn attach_authors(
    threads: &mut [CommentThread],
    authors: &HashMap<i32, User>,
) -> Result<(), i32> {
    for thread in threads {
        let author_id = thread.comment.author_id;
        let author = authors.get(&author_id).ok_or(author_id)?;
        thread.author = Some(author.clone());
        attach_authors(&mut thread.replies, authors)?;
    }

    Ok(())
}
