//! Database constraint violations for the comment store tables.
//!
//! Constraint names here must match the names declared in the migrations so
//! that [`PgError::constraint_violation`] can classify query failures.
//!
//! [`PgError::constraint_violation`]: crate::PgError::constraint_violation

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Unified constraint violation enum covering every table in the store.
///
/// Wraps the per-table constraint enums, providing a single interface for
/// handling any constraint violation while keeping the table groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintViolation {
    /// Violation on `t_comment`.
    Comment(CommentConstraints),
    /// Violation on `t_article`.
    Article(ArticleConstraints),
    /// Violation on `t_user`.
    User(UserConstraints),
}

/// Categories of database constraint violations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintCategory {
    /// Data validation constraints (format, length, range checks).
    Validation,
    /// Foreign-key constraints (dangling article references).
    ReferentialIntegrity,
    /// Uniqueness constraints (primary keys, unique indexes).
    Uniqueness,
}

impl ConstraintViolation {
    /// Creates a new [`ConstraintViolation`] from a constraint name.
    ///
    /// Returns `None` if the constraint name is not recognized.
    pub fn new(constraint: &str) -> Option<Self> {
        if let Some(c) = CommentConstraints::new(constraint) {
            return Some(Self::Comment(c));
        }
        if let Some(c) = ArticleConstraints::new(constraint) {
            return Some(Self::Article(c));
        }

        UserConstraints::new(constraint).map(Self::User)
    }

    /// Returns the category of this constraint violation.
    pub fn categorize(&self) -> ConstraintCategory {
        match self {
            Self::Comment(c) => c.categorize(),
            Self::Article(c) => c.categorize(),
            Self::User(c) => c.categorize(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment(c) => c.fmt(f),
            Self::Article(c) => c.fmt(f),
            Self::User(c) => c.fmt(f),
        }
    }
}

/// `t_comment` table constraint violations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(into = "String", try_from = "String")]
pub enum CommentConstraints {
    // Content validation constraints
    #[strum(serialize = "t_comment_content_length")]
    ContentLength,

    // Relation constraints (usr_id carries no foreign key, so the author
    // reference never surfaces here)
    #[strum(serialize = "t_comment_article_fk")]
    ArticleFk,
}

impl CommentConstraints {
    /// Creates a new [`CommentConstraints`] from the constraint name.
    pub fn new(constraint: &str) -> Option<Self> {
        constraint.parse().ok()
    }

    /// Returns the category of this constraint violation.
    pub fn categorize(&self) -> ConstraintCategory {
        match self {
            CommentConstraints::ContentLength => ConstraintCategory::Validation,

            CommentConstraints::ArticleFk => ConstraintCategory::ReferentialIntegrity,
        }
    }
}

/// `t_article` table constraint violations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(into = "String", try_from = "String")]
pub enum ArticleConstraints {
    #[strum(serialize = "t_article_title_length")]
    TitleLength,
}

impl ArticleConstraints {
    /// Creates a new [`ArticleConstraints`] from the constraint name.
    pub fn new(constraint: &str) -> Option<Self> {
        constraint.parse().ok()
    }

    /// Returns the category of this constraint violation.
    pub fn categorize(&self) -> ConstraintCategory {
        match self {
            ArticleConstraints::TitleLength => ConstraintCategory::Validation,
        }
    }
}

/// `t_user` table constraint violations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(into = "String", try_from = "String")]
pub enum UserConstraints {
    #[strum(serialize = "t_user_name_unique")]
    NameUnique,
    #[strum(serialize = "t_user_name_length")]
    NameLength,
}

impl UserConstraints {
    /// Creates a new [`UserConstraints`] from the constraint name.
    pub fn new(constraint: &str) -> Option<Self> {
        constraint.parse().ok()
    }

    /// Returns the category of this constraint violation.
    pub fn categorize(&self) -> ConstraintCategory {
        match self {
            UserConstraints::NameUnique => ConstraintCategory::Uniqueness,
            UserConstraints::NameLength => ConstraintCategory::Validation,
        }
    }
}

macro_rules! impl_string_conversions {
    ($($ty:ty),+ $(,)?) => {$(
        impl From<$ty> for String {
            #[inline]
            fn from(val: $ty) -> Self {
                val.to_string()
            }
        }

        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            #[inline]
            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )+};
}

impl_string_conversions!(CommentConstraints, ArticleConstraints, UserConstraints);
