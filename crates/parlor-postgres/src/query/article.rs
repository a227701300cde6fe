//! Article repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{Article, NewArticle, UpdateArticle};
use crate::query::CommentRepository;
use crate::{PgClient, PgError, PgResult, schema};

/// Repository for article database operations.
pub trait ArticleRepository {
    /// Finds an article by its id.
    fn find_article(&self, article_id: i32) -> impl Future<Output = PgResult<Article>> + Send;

    /// Returns all articles, most recent id first.
    fn find_articles(&self) -> impl Future<Output = PgResult<Vec<Article>>> + Send;

    /// Inserts a new article and returns the stored row.
    fn create_article(
        &self,
        new_article: NewArticle,
    ) -> impl Future<Output = PgResult<Article>> + Send;

    /// Updates the mutable fields of an existing article.
    fn update_article(
        &self,
        article_id: i32,
        updates: UpdateArticle,
    ) -> impl Future<Output = PgResult<Article>> + Send;

    /// Removes an article and every comment it carries.
    ///
    /// Comments are hard-removed first so no row is left pointing at a
    /// missing article.
    fn delete_article(&self, article_id: i32) -> impl Future<Output = PgResult<()>> + Send;
}

impl ArticleRepository for PgClient {
    async fn find_article(&self, article_id: i32) -> PgResult<Article> {
        let mut conn = self.get_connection().await?;

        use schema::t_article::{self, dsl};

        t_article::table
            .filter(dsl::art_id.eq(article_id))
            .select(Article::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::ArticleNotFound(article_id))
    }

    async fn find_articles(&self) -> PgResult<Vec<Article>> {
        let mut conn = self.get_connection().await?;

        use schema::t_article::{self, dsl};

        let articles = t_article::table
            .order(dsl::art_id.desc())
            .select(Article::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        Ok(articles)
    }

    async fn create_article(&self, new_article: NewArticle) -> PgResult<Article> {
        let mut conn = self.get_connection().await?;

        use schema::t_article;

        let article = diesel::insert_into(t_article::table)
            .values(&new_article)
            .returning(Article::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(PgError::from)?;

        Ok(article)
    }

    async fn update_article(&self, article_id: i32, updates: UpdateArticle) -> PgResult<Article> {
        let mut conn = self.get_connection().await?;

        use schema::t_article::{self, dsl};

        if updates.is_empty() {
            // Diesel rejects empty changesets; an update with nothing to
            // change returns the current row.
            return t_article::table
                .filter(dsl::art_id.eq(article_id))
                .select(Article::as_select())
                .first(&mut *conn)
                .await
                .optional()
                .map_err(PgError::from)?
                .ok_or(PgError::ArticleNotFound(article_id));
        }

        diesel::update(t_article::table.filter(dsl::art_id.eq(article_id)))
            .set(&updates)
            .returning(Article::as_returning())
            .get_result(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::ArticleNotFound(article_id))
    }

    async fn delete_article(&self, article_id: i32) -> PgResult<()> {
        self.delete_article_comments(article_id).await?;

        let mut conn = self.get_connection().await?;

        use schema::t_article::{self, dsl};

        let removed = diesel::delete(t_article::table.filter(dsl::art_id.eq(article_id)))
            .execute(&mut *conn)
            .await
            .map_err(PgError::from)?;

        if removed == 0 {
            return Err(PgError::ArticleNotFound(article_id));
        }

        Ok(())
    }
}
