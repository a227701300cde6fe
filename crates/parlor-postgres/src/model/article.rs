//! Article model, the owning side of every comment thread.

use diesel::prelude::*;

use crate::schema::t_article;

/// A row of the `t_article` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = t_article)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
    /// Unique article identifier.
    #[diesel(column_name = art_id)]
    pub id: i32,
    /// Article title.
    #[diesel(column_name = art_title)]
    pub title: String,
    /// Article body.
    #[diesel(column_name = art_content)]
    pub content: String,
}

/// Data for inserting a new article.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = t_article)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewArticle {
    /// Article title.
    #[diesel(column_name = art_title)]
    pub title: String,
    /// Article body.
    #[diesel(column_name = art_content)]
    pub content: String,
}

/// Data for updating an existing article.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = t_article)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateArticle {
    /// Article title.
    #[diesel(column_name = art_title)]
    pub title: Option<String>,
    /// Article body.
    #[diesel(column_name = art_content)]
    pub content: Option<String>,
}

impl NewArticle {
    /// Creates a new article.
    pub fn new(title: String, content: String) -> Self {
        Self { title, content }
    }
}

impl UpdateArticle {
    /// Returns whether the changeset carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}
