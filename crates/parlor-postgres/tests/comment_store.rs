//! Integration tests against a live Postgres server.
//!
//! Set `POSTGRES_URL` to a connection string with database-creation rights;
//! each test provisions its own throwaway database, runs the embedded
//! migrations, and drops the database again on success. Without
//! `POSTGRES_URL` every test returns early.

use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use parlor_postgres::model::{NewArticle, NewComment, NewUser, UpdateComment};
use parlor_postgres::query::{ArticleRepository, CommentRepository, UserRepository};
use parlor_postgres::{PgClient, PgClientExt, PgConfig, PgError};

/// A throwaway database provisioned for a single test.
struct TestDb {
    client: PgClient,
    admin_url: String,
    name: String,
}

impl TestDb {
    /// Creates a fresh database and a migrated client for it, or `None`
    /// when `POSTGRES_URL` is unset.
    async fn provision(name_hint: &str) -> Option<Self> {
        dotenvy::dotenv().ok();
        let admin_url = std::env::var("POSTGRES_URL").ok()?;

        let name = format!(
            "parlor_test_{name_hint}_{}",
            uuid::Uuid::new_v4().simple()
        );
        let mut admin = AsyncPgConnection::establish(&admin_url)
            .await
            .expect("failed to connect to POSTGRES_URL");
        diesel::sql_query(format!("CREATE DATABASE {name}"))
            .execute(&mut admin)
            .await
            .expect("failed to create test database");

        let client = PgConfig::new(with_database(&admin_url, &name))
            .with_max_connections(2)
            .build()
            .expect("failed to build test client");
        client
            .run_pending_migrations()
            .await
            .expect("failed to run migrations");

        Some(Self {
            client,
            admin_url,
            name,
        })
    }

    /// Drops the throwaway database. Called on success only, so a failed
    /// test leaves its state behind for inspection.
    async fn finish(self) {
        let Self {
            client,
            admin_url,
            name,
        } = self;
        drop(client);

        let mut admin = AsyncPgConnection::establish(&admin_url)
            .await
            .expect("failed to connect to POSTGRES_URL");
        diesel::sql_query(format!("DROP DATABASE {name} WITH (FORCE)"))
            .execute(&mut admin)
            .await
            .expect("failed to drop test database");
    }
}

/// Replaces the database segment of a plain (query-less) connection URL.
fn with_database(base_url: &str, database: &str) -> String {
    let authority = base_url.find("://").map(|i| i + 3).unwrap_or(0);
    match base_url[authority..].rfind('/') {
        Some(slash) => format!("{}/{database}", &base_url[..authority + slash]),
        None => format!("{base_url}/{database}"),
    }
}

/// Seeds one article and two users, returning `(article_id, author_id,
/// other_author_id)`.
async fn seed(client: &PgClient) -> (i32, i32, i32) {
    let article = client
        .create_article(NewArticle::new("title".into(), "body".into()))
        .await
        .expect("seed article");
    let author = client
        .create_user(NewUser::new("alice".into(), "hash".into()))
        .await
        .expect("seed user");
    let other = client
        .create_user(NewUser::new("bob".into(), "hash".into()))
        .await
        .expect("seed second user");
    (article.id, author.id, other.id)
}

#[tokio::test]
async fn create_assigns_id_and_defaults() {
    let Some(db) = TestDb::provision("create").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let comment = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "hi".into()))
        .await
        .unwrap();

    assert!(comment.id > 0);
    assert!(comment.is_top_level());
    assert!(!comment.is_signaled);
    assert!(!comment.is_deleted);

    db.finish().await;
}

#[tokio::test]
async fn find_round_trips_and_hydrates() {
    let Some(db) = TestDb::provision("find").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let created = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "hi".into()))
        .await
        .unwrap();

    let thread = db.client.find_comment(created.id).await.unwrap();
    assert_eq!(thread.comment, created);
    assert_eq!(thread.author.as_ref().map(|u| u.username.as_str()), Some("alice"));
    assert_eq!(thread.article.as_ref().map(|a| a.id), Some(article_id));
    assert!(thread.replies.is_empty());

    db.finish().await;
}

#[tokio::test]
async fn find_missing_is_not_found() {
    let Some(db) = TestDb::provision("missing").await else {
        return;
    };

    let err = db.client.find_comment(41).await.unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(41)));

    db.finish().await;
}

#[tokio::test]
async fn find_returns_deleted_comments() {
    let Some(db) = TestDb::provision("find_deleted").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let created = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "gone".into()))
        .await
        .unwrap();
    db.client.delete_comment(created.id).await.unwrap();

    let thread = db.client.find_comment(created.id).await.unwrap();
    assert!(thread.comment.is_deleted);
    assert_eq!(thread.comment.visible_content(), None);

    db.finish().await;
}

#[tokio::test]
async fn article_threads_shape_and_order() {
    let Some(db) = TestDb::provision("threads").await else {
        return;
    };
    let (article_id, alice, bob) = seed(&db.client).await;

    let first = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "first".into()))
        .await
        .unwrap();
    let reply = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "reply".into()).as_reply_to(first.id))
        .await
        .unwrap();
    let nested = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "nested".into()).as_reply_to(reply.id))
        .await
        .unwrap();
    let second = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "second".into()))
        .await
        .unwrap();
    let buried = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "buried".into()))
        .await
        .unwrap();
    db.client.delete_comment(buried.id).await.unwrap();

    let threads = db.client.find_comments_by_article(article_id).await.unwrap();

    // Top level ascending by id, deleted rows absent.
    let top: Vec<i32> = threads.iter().map(|t| t.comment.id).collect();
    assert_eq!(top, vec![first.id, second.id]);

    // Nesting follows parent links.
    assert_eq!(threads[0].replies.len(), 1);
    assert_eq!(threads[0].replies[0].comment.id, reply.id);
    assert_eq!(threads[0].replies[0].replies[0].comment.id, nested.id);
    assert_eq!(threads[0].total_comments(), 3);

    // The article rides on top-level nodes only; authors ride everywhere.
    assert!(threads.iter().all(|t| t.article.is_some()));
    assert!(threads[0].replies[0].article.is_none());
    assert_eq!(
        threads[0].replies[0].author.as_ref().map(|u| u.username.as_str()),
        Some("bob")
    );

    db.finish().await;
}

#[tokio::test]
async fn article_threads_require_the_article() {
    let Some(db) = TestDb::provision("no_article").await else {
        return;
    };

    let err = db.client.find_comments_by_article(7).await.unwrap_err();
    assert!(matches!(err, PgError::ArticleNotFound(7)));

    db.finish().await;
}

#[tokio::test]
async fn delete_cascades_along_the_reply_chain() {
    let Some(db) = TestDb::provision("cascade").await else {
        return;
    };
    let (article_id, alice, bob) = seed(&db.client).await;

    let a = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "a".into()))
        .await
        .unwrap();
    let b = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "b".into()).as_reply_to(a.id))
        .await
        .unwrap();
    let c = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "c".into()).as_reply_to(b.id))
        .await
        .unwrap();
    // A later sibling reply to `a`; outside the first-child chain.
    let sibling = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "d".into()).as_reply_to(a.id))
        .await
        .unwrap();

    db.client.delete_comment(a.id).await.unwrap();

    for id in [a.id, b.id, c.id] {
        let thread = db.client.find_comment(id).await.unwrap();
        assert!(thread.comment.is_deleted, "comment {id} should be deleted");
    }
    let survivor = db.client.find_comment(sibling.id).await.unwrap();
    assert!(!survivor.comment.is_deleted);

    db.finish().await;
}

#[tokio::test]
async fn delete_is_idempotent_but_requires_the_row() {
    let Some(db) = TestDb::provision("idempotent").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let comment = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "x".into()))
        .await
        .unwrap();

    db.client.delete_comment(comment.id).await.unwrap();
    db.client.delete_comment(comment.id).await.unwrap();

    let err = db.client.delete_comment(comment.id + 100).await.unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(_)));

    db.finish().await;
}

#[tokio::test]
async fn moderation_feeds_split_on_the_signal_flag() {
    let Some(db) = TestDb::provision("moderation").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let mut ids = Vec::new();
    for content in ["one", "two", "three", "four"] {
        let comment = db
            .client
            .create_comment(NewComment::on_article(article_id, author_id, content.into()))
            .await
            .unwrap();
        ids.push(comment.id);
    }

    db.client.signal_comment(ids[0]).await.unwrap();
    db.client.signal_comment(ids[2]).await.unwrap();
    // Signaled and then deleted: must vanish from both feeds.
    db.client.signal_comment(ids[3]).await.unwrap();
    db.client.delete_comment(ids[3]).await.unwrap();

    let queue: Vec<i32> = db
        .client
        .find_signaled_comments()
        .await
        .unwrap()
        .iter()
        .map(|t| t.comment.id)
        .collect();
    assert_eq!(queue, vec![ids[2], ids[0]]);

    let feed: Vec<i32> = db
        .client
        .find_comments()
        .await
        .unwrap()
        .iter()
        .map(|t| t.comment.id)
        .collect();
    assert_eq!(feed, vec![ids[1]]);

    db.finish().await;
}

#[tokio::test]
async fn feeds_list_replies_flat_and_nested() {
    let Some(db) = TestDb::provision("feed_shape").await else {
        return;
    };
    let (article_id, alice, bob) = seed(&db.client).await;

    let root = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "root".into()))
        .await
        .unwrap();
    let reply = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "reply".into()).as_reply_to(root.id))
        .await
        .unwrap();

    let feed = db.client.find_comments().await.unwrap();

    // The reply is an entry of its own and also sits inside the root's
    // subtree.
    let ids: Vec<i32> = feed.iter().map(|t| t.comment.id).collect();
    assert_eq!(ids, vec![reply.id, root.id]);
    assert!(feed[0].replies.is_empty());
    assert_eq!(feed[1].replies[0].comment.id, reply.id);

    db.finish().await;
}

#[tokio::test]
async fn find_by_parent_returns_the_first_reply() {
    let Some(db) = TestDb::provision("by_parent").await else {
        return;
    };
    let (article_id, alice, bob) = seed(&db.client).await;

    let parent = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "p".into()))
        .await
        .unwrap();

    assert!(db
        .client
        .find_comment_by_parent(parent.id)
        .await
        .unwrap()
        .is_none());

    let first = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "r1".into()).as_reply_to(parent.id))
        .await
        .unwrap();
    db.client
        .create_comment(NewComment::on_article(article_id, alice, "r2".into()).as_reply_to(parent.id))
        .await
        .unwrap();

    let found = db
        .client
        .find_comment_by_parent(parent.id)
        .await
        .unwrap()
        .expect("a reply exists");
    assert_eq!(found.comment.id, first.id);

    db.finish().await;
}

#[tokio::test]
async fn update_changes_fields_but_not_the_date() {
    let Some(db) = TestDb::provision("update").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let created = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "draft".into()))
        .await
        .unwrap();

    let updated = db
        .client
        .update_comment(created.id, UpdateComment::content("final".into()))
        .await
        .unwrap();
    assert_eq!(updated.content, "final");
    assert_eq!(updated.comment_date, created.comment_date);

    let signaled = db.client.signal_comment(created.id).await.unwrap();
    assert!(signaled.is_signaled);

    let err = db
        .client
        .update_comment(created.id + 100, UpdateComment::content("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(_)));

    db.finish().await;
}

#[tokio::test]
async fn article_cleanup_hard_removes_rows() {
    let Some(db) = TestDb::provision("article_cleanup").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let kept_article = db
        .client
        .create_article(NewArticle::new("other".into(), "body".into()))
        .await
        .unwrap();
    let doomed = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "a".into()))
        .await
        .unwrap();
    db.client
        .create_comment(NewComment::on_article(article_id, author_id, "b".into()).as_reply_to(doomed.id))
        .await
        .unwrap();
    let kept = db
        .client
        .create_comment(NewComment::on_article(kept_article.id, author_id, "c".into()))
        .await
        .unwrap();

    let removed = db.client.delete_article_comments(article_id).await.unwrap();
    assert_eq!(removed, 2);

    let err = db.client.find_comment(doomed.id).await.unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(_)));
    assert!(db.client.find_comment(kept.id).await.is_ok());

    db.finish().await;
}

#[tokio::test]
async fn author_cleanup_soft_deletes_with_cascade() {
    let Some(db) = TestDb::provision("author_cleanup").await else {
        return;
    };
    let (article_id, alice, bob) = seed(&db.client).await;

    let authored = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "mine".into()))
        .await
        .unwrap();
    // Someone else's reply, dragged down by the cascade.
    let reply = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "theirs".into()).as_reply_to(authored.id))
        .await
        .unwrap();
    let unrelated = db
        .client
        .create_comment(NewComment::on_article(article_id, bob, "other".into()))
        .await
        .unwrap();

    let count = db.client.delete_author_comments(alice).await.unwrap();
    assert_eq!(count, 1);

    for id in [authored.id, reply.id] {
        let thread = db.client.find_comment(id).await.unwrap();
        assert!(thread.comment.is_deleted);
    }
    let survivor = db.client.find_comment(unrelated.id).await.unwrap();
    assert!(!survivor.comment.is_deleted);

    db.finish().await;
}

#[tokio::test]
async fn purge_removes_the_row_outright() {
    let Some(db) = TestDb::provision("purge").await else {
        return;
    };
    let (article_id, author_id, _) = seed(&db.client).await;

    let comment = db
        .client
        .create_comment(NewComment::on_article(article_id, author_id, "x".into()))
        .await
        .unwrap();
    db.client.purge_comment(comment.id).await.unwrap();

    let err = db.client.find_comment(comment.id).await.unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(_)));

    // Purging an absent row is a no-op.
    db.client.purge_comment(comment.id).await.unwrap();

    db.finish().await;
}

#[tokio::test]
async fn removing_a_user_keeps_their_deleted_comments() {
    let Some(db) = TestDb::provision("user_removal").await else {
        return;
    };
    let (article_id, alice, _) = seed(&db.client).await;

    let comment = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "mine".into()))
        .await
        .unwrap();

    db.client.delete_user(alice).await.unwrap();

    let err = db.client.find_user(alice).await.unwrap_err();
    assert!(matches!(err, PgError::UserNotFound(_)));

    // The row is still in storage, naming the departed author; hydrating it
    // fails on author resolution, not on the comment lookup.
    let err = db.client.find_comment(comment.id).await.unwrap_err();
    assert!(matches!(err, PgError::UserNotFound(id) if id == alice));

    db.finish().await;
}

#[tokio::test]
async fn removing_an_article_takes_its_comments_with_it() {
    let Some(db) = TestDb::provision("article_removal").await else {
        return;
    };
    let (article_id, alice, _) = seed(&db.client).await;

    let comment = db
        .client
        .create_comment(NewComment::on_article(article_id, alice, "x".into()))
        .await
        .unwrap();

    db.client.delete_article(article_id).await.unwrap();

    let err = db.client.find_article(article_id).await.unwrap_err();
    assert!(matches!(err, PgError::ArticleNotFound(_)));
    let err = db.client.find_comment(comment.id).await.unwrap_err();
    assert!(matches!(err, PgError::CommentNotFound(_)));

    db.finish().await;
}

#[tokio::test]
async fn migrations_report_up_to_date() {
    let Some(db) = TestDb::provision("migrations").await else {
        return;
    };

    let status = db.client.migration_status().await.unwrap();
    assert!(status.is_up_to_date());
    assert!(!status.applied.is_empty());

    db.finish().await;
}
