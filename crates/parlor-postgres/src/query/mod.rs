//! Repository traits implemented for [`PgClient`].
//!
//! Each operation scopes a single pooled connection to its own body and
//! bubbles failures up as [`PgError`].
//!
//! [`PgClient`]: crate::PgClient
//! [`PgError`]: crate::PgError

mod article;
mod comment;
mod user;

pub use crate::query::article::ArticleRepository;
pub use crate::query::comment::CommentRepository;
pub use crate::query::user::UserRepository;
