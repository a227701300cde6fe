//! Comment repository: persistence and thread management for discussions.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{
    Article, Comment, CommentThread, NewComment, UpdateComment, User, attach_authors,
    build_threads, collect_author_ids,
};
use crate::types::constants::comment::TOP_LEVEL_PARENT_ID;
use crate::{PgClient, PgError, PgResult, PooledConnection, TRACING_TARGET_QUERY, schema};

/// Repository for comment database operations.
///
/// Sole mediator between [`Comment`] values and the `t_comment` table:
/// thread assembly, the soft-delete cascade along reply chains, moderation
/// feeds, and the hard-removal cleanup primitives.
pub trait CommentRepository {
    /// Finds a comment by its id, deleted or not.
    ///
    /// Hydrates the non-deleted reply subtree, the author, and the owning
    /// article. Fails with [`PgError::CommentNotFound`] when no row exists;
    /// this is the only read with a not-found error.
    fn find_comment(&self, comment_id: i32) -> impl Future<Output = PgResult<CommentThread>> + Send;

    /// Finds the comment whose `parent_id` equals the given id.
    ///
    /// At most one by contract (first by ascending id when siblings exist;
    /// see [`delete_comment`] for the cascade built on this). Returns `None`
    /// when there is no such comment, never an error.
    ///
    /// [`delete_comment`]: CommentRepository::delete_comment
    fn find_comment_by_parent(
        &self,
        parent_id: i32,
    ) -> impl Future<Output = PgResult<Option<CommentThread>>> + Send;

    /// Returns the comment trees of an article.
    ///
    /// Loads the article once (failing with [`PgError::ArticleNotFound`] if
    /// it does not exist), then the non-deleted top-level comments in
    /// ascending id order, each with its recursively attached non-deleted
    /// replies, ascending by id at every level. The article is attached to
    /// the top-level nodes only.
    fn find_comments_by_article(
        &self,
        article_id: i32,
    ) -> impl Future<Output = PgResult<Vec<CommentThread>>> + Send;

    /// Returns all non-deleted, non-signaled comments, most recent id first.
    ///
    /// A flat moderation feed: replies appear both as entries of their own
    /// and inside the subtrees of earlier entries.
    fn find_comments(&self) -> impl Future<Output = PgResult<Vec<CommentThread>>> + Send;

    /// Returns all non-deleted, signaled comments, most recent id first.
    ///
    /// The moderation queue awaiting review.
    fn find_signaled_comments(&self) -> impl Future<Output = PgResult<Vec<CommentThread>>> + Send;

    /// Inserts a new comment and returns the stored row.
    ///
    /// Storage assigns the id and the comment date; the returned [`Comment`]
    /// carries both.
    fn create_comment(
        &self,
        new_comment: NewComment,
    ) -> impl Future<Output = PgResult<Comment>> + Send;

    /// Updates the mutable fields of an existing comment.
    ///
    /// An empty changeset returns the current row unchanged. Fails with
    /// [`PgError::CommentNotFound`] when no row exists for the id.
    fn update_comment(
        &self,
        comment_id: i32,
        updates: UpdateComment,
    ) -> impl Future<Output = PgResult<Comment>> + Send;

    /// Flags a comment for moderator review.
    fn signal_comment(&self, comment_id: i32) -> impl Future<Output = PgResult<Comment>> + Send;

    /// Soft-deletes a comment and its reply chain.
    ///
    /// Follows [`find_comment_by_parent`]'s at-most-one contract link by
    /// link, marks the chain deepest-first, then the comment itself. Rows
    /// stay in storage with `is_deleted` set. Idempotent. Siblings outside
    /// the chain are never touched.
    ///
    /// [`find_comment_by_parent`]: CommentRepository::find_comment_by_parent
    fn delete_comment(&self, comment_id: i32) -> impl Future<Output = PgResult<()>> + Send;

    /// Hard-removes every comment row of an article.
    ///
    /// Bulk cleanup for article removal; bypasses soft deletion. Returns the
    /// number of rows removed.
    fn delete_article_comments(
        &self,
        article_id: i32,
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Soft-deletes every comment authored by a user.
    ///
    /// Each comment goes through [`delete_comment`], so the reply-chain
    /// cascade applies to everything the user ever wrote. Returns the number
    /// of authored comments processed.
    ///
    /// [`delete_comment`]: CommentRepository::delete_comment
    fn delete_author_comments(&self, user_id: i32)
    -> impl Future<Output = PgResult<usize>> + Send;

    /// Hard-removes a single comment row, deleted or not.
    ///
    /// Administrative cleanup primitive; not part of the contract used by
    /// presentation code.
    fn purge_comment(&self, comment_id: i32) -> impl Future<Output = PgResult<()>> + Send;
}

impl CommentRepository for PgClient {
    async fn find_comment(&self, comment_id: i32) -> PgResult<CommentThread> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        let row = t_comment::table
            .filter(dsl::com_id.eq(comment_id))
            .select(Comment::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::CommentNotFound(comment_id))?;

        let mut threads = hydrate_threads(&mut conn, vec![row], ArticleSource::Lookup).await?;
        threads
            .pop()
            .ok_or_else(|| PgError::Unexpected("thread assembly dropped its root".into()))
    }

    async fn find_comment_by_parent(&self, parent_id: i32) -> PgResult<Option<CommentThread>> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        let row = t_comment::table
            .filter(dsl::parent_id.eq(parent_id))
            .order(dsl::com_id.asc())
            .select(Comment::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut threads = hydrate_threads(&mut conn, vec![row], ArticleSource::Lookup).await?;
        Ok(threads.pop())
    }

    async fn find_comments_by_article(&self, article_id: i32) -> PgResult<Vec<CommentThread>> {
        let mut conn = self.get_connection().await?;

        // The associated article is retrieved only once and shared by every
        // top-level node.
        use schema::t_article::{self, dsl as article_dsl};

        let article = t_article::table
            .filter(article_dsl::art_id.eq(article_id))
            .select(Article::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::ArticleNotFound(article_id))?;

        use schema::t_comment::{self, dsl};

        let roots = t_comment::table
            .filter(dsl::art_id.eq(article_id))
            .filter(dsl::parent_id.eq(TOP_LEVEL_PARENT_ID))
            .filter(dsl::is_deleted.eq(false))
            .order(dsl::com_id.asc())
            .select(Comment::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        hydrate_threads(&mut conn, roots, ArticleSource::Shared(article)).await
    }

    async fn find_comments(&self) -> PgResult<Vec<CommentThread>> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        let rows = t_comment::table
            .filter(dsl::is_deleted.eq(false))
            .filter(dsl::is_signaled.eq(false))
            .order(dsl::com_id.desc())
            .select(Comment::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        hydrate_feed(&mut conn, rows).await
    }

    async fn find_signaled_comments(&self) -> PgResult<Vec<CommentThread>> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        let rows = t_comment::table
            .filter(dsl::is_deleted.eq(false))
            .filter(dsl::is_signaled.eq(true))
            .order(dsl::com_id.desc())
            .select(Comment::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        hydrate_feed(&mut conn, rows).await
    }

    async fn create_comment(&self, new_comment: NewComment) -> PgResult<Comment> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment;

        let comment = diesel::insert_into(t_comment::table)
            .values(&new_comment)
            .returning(Comment::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            comment_id = comment.id,
            article_id = comment.article_id,
            parent_id = comment.parent_id,
            "comment created"
        );
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: i32, updates: UpdateComment) -> PgResult<Comment> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        if updates.is_empty() {
            // Diesel rejects empty changesets; an update with nothing to
            // change returns the current row.
            return t_comment::table
                .filter(dsl::com_id.eq(comment_id))
                .select(Comment::as_select())
                .first(&mut *conn)
                .await
                .optional()
                .map_err(PgError::from)?
                .ok_or(PgError::CommentNotFound(comment_id));
        }

        diesel::update(t_comment::table.filter(dsl::com_id.eq(comment_id)))
            .set(&updates)
            .returning(Comment::as_returning())
            .get_result(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::CommentNotFound(comment_id))
    }

    async fn signal_comment(&self, comment_id: i32) -> PgResult<Comment> {
        self.update_comment(comment_id, UpdateComment::signaled())
            .await
    }

    async fn delete_comment(&self, comment_id: i32) -> PgResult<()> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        // Walk the reply chain: one child per link by the findByParent
        // contract, so siblings sharing a parent are left alone. The seen
        // set terminates malformed parent cycles.
        let mut chain = vec![comment_id];
        let mut seen = HashSet::from([comment_id]);
        let mut cursor = comment_id;

        loop {
            let child: Option<i32> = t_comment::table
                .filter(dsl::parent_id.eq(cursor))
                .order(dsl::com_id.asc())
                .select(dsl::com_id)
                .first(&mut *conn)
                .await
                .optional()
                .map_err(PgError::from)?;

            match child {
                Some(child_id) if seen.insert(child_id) => {
                    chain.push(child_id);
                    cursor = child_id;
                }
                _ => break,
            }
        }

        // Deepest link first, the requested comment last.
        for id in chain.iter().rev() {
            let updated = diesel::update(t_comment::table.filter(dsl::com_id.eq(id)))
                .set(dsl::is_deleted.eq(true))
                .execute(&mut *conn)
                .await
                .map_err(PgError::from)?;

            if updated == 0 && *id == comment_id {
                return Err(PgError::CommentNotFound(comment_id));
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            comment_id,
            chain_length = chain.len(),
            "comment soft-deleted with its reply chain"
        );
        Ok(())
    }

    async fn delete_article_comments(&self, article_id: i32) -> PgResult<usize> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        let removed = diesel::delete(t_comment::table.filter(dsl::art_id.eq(article_id)))
            .execute(&mut *conn)
            .await
            .map_err(PgError::from)?;

        tracing::info!(
            target: TRACING_TARGET_QUERY,
            article_id,
            removed,
            "article comments hard-removed"
        );
        Ok(removed)
    }

    async fn delete_author_comments(&self, user_id: i32) -> PgResult<usize> {
        let authored: Vec<i32> = {
            let mut conn = self.get_connection().await?;

            use schema::t_comment::{self, dsl};

            t_comment::table
                .filter(dsl::usr_id.eq(user_id))
                .order(dsl::com_id.asc())
                .select(dsl::com_id)
                .load(&mut *conn)
                .await
                .map_err(PgError::from)?
        };

        // Soft-delete each one individually so the reply-chain cascade
        // applies; a comment already cascaded away stays deleted.
        let count = authored.len();
        for comment_id in authored {
            self.delete_comment(comment_id).await?;
        }

        tracing::info!(
            target: TRACING_TARGET_QUERY,
            user_id,
            count,
            "authored comments soft-deleted"
        );
        Ok(count)
    }

    async fn purge_comment(&self, comment_id: i32) -> PgResult<()> {
        let mut conn = self.get_connection().await?;

        use schema::t_comment::{self, dsl};

        diesel::delete(t_comment::table.filter(dsl::com_id.eq(comment_id)))
            .execute(&mut *conn)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }
}

/// Where the article of a top-level node comes from.
enum ArticleSource {
    /// Look articles up by the `art_id` the rows carry (batched).
    Lookup,
    /// The caller already loaded the article; share it across all roots.
    Shared(Article),
}

/// Hydrates feed rows, each as the root of its own thread.
///
/// A reply in a feed shows up twice by contract: flat as its own entry and
/// nested inside the entry of an earlier (higher-id) ancestor, so every row
/// gets an independently fetched subtree.
async fn hydrate_feed(
    conn: &mut PooledConnection,
    rows: Vec<Comment>,
) -> PgResult<Vec<CommentThread>> {
    let mut threads = Vec::with_capacity(rows.len());
    for row in rows {
        let replies = load_reply_rows(conn, vec![row.id]).await?;
        threads.extend(build_threads(vec![row], replies));
    }

    attach_articles(conn, &mut threads).await?;
    attach_thread_authors(conn, &mut threads).await?;
    Ok(threads)
}

/// Hydrates root rows into threads: reply subtrees, authors, and articles
/// on the top-level nodes.
async fn hydrate_threads(
    conn: &mut PooledConnection,
    roots: Vec<Comment>,
    article: ArticleSource,
) -> PgResult<Vec<CommentThread>> {
    let root_ids: Vec<i32> = roots.iter().map(|c| c.id).collect();
    let replies = load_reply_rows(conn, root_ids).await?;
    let mut threads = build_threads(roots, replies);

    match article {
        ArticleSource::Shared(article) => {
            for thread in &mut threads {
                thread.article = Some(article.clone());
            }
        }
        ArticleSource::Lookup => attach_articles(conn, &mut threads).await?,
    }

    attach_thread_authors(conn, &mut threads).await?;
    Ok(threads)
}

/// Loads all non-deleted descendant rows of the given roots, level by level,
/// each level ordered by ascending id.
async fn load_reply_rows(conn: &mut PooledConnection, root_ids: Vec<i32>) -> PgResult<Vec<Comment>> {
    use schema::t_comment::{self, dsl};

    let mut seen: HashSet<i32> = root_ids.iter().copied().collect();
    let mut level = root_ids;
    let mut replies = Vec::new();

    while !level.is_empty() {
        let rows: Vec<Comment> = t_comment::table
            .filter(dsl::parent_id.eq_any(&level))
            .filter(dsl::is_deleted.eq(false))
            .order(dsl::com_id.asc())
            .select(Comment::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        // Ids already visited would re-enter the loop through a parent
        // cycle; skip them.
        level = rows
            .iter()
            .map(|c| c.id)
            .filter(|id| seen.insert(*id))
            .collect();
        replies.extend(rows.into_iter().filter(|c| level.contains(&c.id)));
    }

    Ok(replies)
}

/// Attaches the owning article to each top-level node, batched by article id.
async fn attach_articles(
    conn: &mut PooledConnection,
    threads: &mut [CommentThread],
) -> PgResult<()> {
    use schema::t_article::{self, dsl};

    let mut article_ids: Vec<i32> = Vec::new();
    for thread in threads.iter() {
        if !article_ids.contains(&thread.comment.article_id) {
            article_ids.push(thread.comment.article_id);
        }
    }
    if article_ids.is_empty() {
        return Ok(());
    }

    let articles: Vec<Article> = t_article::table
        .filter(dsl::art_id.eq_any(&article_ids))
        .select(Article::as_select())
        .load(&mut *conn)
        .await
        .map_err(PgError::from)?;
    let by_id: HashMap<i32, Article> = articles.into_iter().map(|a| (a.id, a)).collect();

    for thread in threads {
        let article_id = thread.comment.article_id;
        let article = by_id
            .get(&article_id)
            .cloned()
            .ok_or(PgError::ArticleNotFound(article_id))?;
        thread.article = Some(article);
    }

    Ok(())
}

/// Attaches authors to every node of the given threads, batched by user id.
async fn attach_thread_authors(
    conn: &mut PooledConnection,
    threads: &mut [CommentThread],
) -> PgResult<()> {
    use schema::t_user::{self, dsl};

    let author_ids = collect_author_ids(threads);
    if author_ids.is_empty() {
        return Ok(());
    }

    let users: Vec<User> = t_user::table
        .filter(dsl::usr_id.eq_any(&author_ids))
        .select(User::as_select())
        .load(&mut *conn)
        .await
        .map_err(PgError::from)?;
    let by_id: HashMap<i32, User> = users.into_iter().map(|u| (u.id, u)).collect();

    attach_authors(threads, &by_id).map_err(PgError::UserNotFound)
}
