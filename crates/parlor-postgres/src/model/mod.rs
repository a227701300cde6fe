//! Database models for the comment store.
//!
//! This module contains Diesel model definitions for the backing tables,
//! including structs for querying, inserting, and updating records, plus the
//! hydrated [`CommentThread`] read model assembled from flat rows.

mod article;
mod comment;
mod thread;
mod user;

pub use article::{Article, NewArticle, UpdateArticle};
pub use comment::{Comment, NewComment, UpdateComment};
pub use thread::{CommentThread, attach_authors, build_threads, collect_author_ids};
pub use user::{NewUser, User};
