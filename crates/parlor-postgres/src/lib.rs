#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Schema migrations compiled into the library.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("./migrations");

// Tracing targets, one per concern, so subscribers can filter storage noise
// without string-matching messages.

/// Tracing target for client construction and lifecycle events.
pub const TRACING_TARGET_CLIENT: &str = "parlor_postgres::client";

/// Tracing target for repository query execution.
pub const TRACING_TARGET_QUERY: &str = "parlor_postgres::queries";

/// Tracing target for migration runs and status checks.
pub const TRACING_TARGET_MIGRATION: &str = "parlor_postgres::migrations";

/// Tracing target for connection establishment and pooling.
pub const TRACING_TARGET_CONNECTION: &str = "parlor_postgres::connection";

mod client;
pub mod model;
pub mod query;
mod schema;
pub mod types;

use std::borrow::Cow;

use deadpool::managed::TimeoutType;
use diesel::ConnectionError;
use diesel::result::Error;
pub use diesel_async::AsyncPgConnection as PgConnection;

pub use crate::client::{
    ConnectionPool, MigrationResult, MigrationStatus, PgClient, PgClientExt, PgConfig, PgConn,
    PgPoolStatus, PooledConnection, get_migration_status, run_pending_migrations,
};
use crate::types::ConstraintViolation;

pub mod error {
    //! Re-exported error types from the underlying database stack.
    //!
    //! Most callers only need [`PgError`]; these exports are for matching on
    //! the wrapped sources.
    //!
    //! [`PgError`]: crate::PgError

    /// Type-erased error for sources without a dedicated variant.
    pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

    pub use deadpool::managed::TimeoutType;
    pub use diesel::result::{ConnectionError as DieselConnectionError, Error as DieselError};
    pub use diesel_async::pooled_connection::PoolError as DieselPoolError;
    pub use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;
}

/// Error type for all comment-store database operations.
///
/// Covers connection and pool failures, query errors, migration problems,
/// and the not-found conditions surfaced by the lookup operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "dropping a database error loses its context"]
pub enum PgError {
    /// A configuration value failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pool timed out creating, recycling, or waiting for a connection.
    #[error("Database operation timed out")]
    Timeout(TimeoutType),

    /// A connection could not be established or went bad.
    #[error("Database connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A migration failed to apply or report status.
    #[error("Database migration error: {0}")]
    Migration(error::BoxError),

    /// A query failed: SQL errors, constraint violations, type mismatches.
    #[error("Database query error: {0}")]
    Query(#[from] Error),

    /// No comment row exists for the requested id.
    ///
    /// Only `find_comment` and the write operations keyed by id surface this;
    /// list operations return empty sequences instead.
    #[error("Comment not found: {0}")]
    CommentNotFound(i32),

    /// An article id could not be resolved while hydrating a comment.
    #[error("Article not found: {0}")]
    ArticleNotFound(i32),

    /// A user id could not be resolved while hydrating a comment author.
    #[error("User not found: {0}")]
    UserNotFound(i32),

    /// A condition no other variant represents.
    #[error("Unexpected error: {0}")]
    Unexpected(Cow<'static, str>),
}

impl PgError {
    /// The violated constraint's name, when this error carries one.
    pub fn constraint(&self) -> Option<&str> {
        let PgError::Query(err) = self else {
            return None;
        };

        let Error::DatabaseError(_, err) = err else {
            return None;
        };

        err.constraint_name()
    }

    /// The violated constraint, resolved to a known [`ConstraintViolation`].
    pub fn constraint_violation(&self) -> Option<ConstraintViolation> {
        self.constraint().and_then(ConstraintViolation::new)
    }

    /// Returns whether this error is one of the not-found conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PgError::CommentNotFound(_) | PgError::ArticleNotFound(_) | PgError::UserNotFound(_)
        )
    }

    /// Returns whether retrying the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PgError::Timeout(_) | PgError::Connection(ConnectionError::BadConnection(_))
        )
    }

    /// The complement of [`is_transient`](PgError::is_transient).
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

impl From<error::DeadpoolError> for PgError {
    fn from(value: error::DeadpoolError) -> Self {
        use error::{DeadpoolError, DieselPoolError};

        match value {
            DeadpoolError::Timeout(timeout) => Self::Timeout(timeout),
            DeadpoolError::Backend(DieselPoolError::QueryError(error)) => Self::Query(error),
            DeadpoolError::Backend(DieselPoolError::ConnectionError(error)) => {
                Self::Connection(error)
            }
            // The lifecycle hooks never fail, so this arm is unreachable in
            // practice.
            DeadpoolError::PostCreateHook(err) => Self::Unexpected(err.to_string().into()),
            // The pool is always built with the tokio runtime.
            DeadpoolError::NoRuntimeSpecified => {
                Self::Unexpected("no runtime specified for the pool".into())
            }
            DeadpoolError::Closed => Self::Connection(ConnectionError::InvalidConnectionUrl(
                "connection pool is closed".into(),
            )),
        }
    }
}

/// Shorthand [`Result`] with [`PgError`] as the default error type.
pub type PgResult<T, E = PgError> = Result<T, E>;
