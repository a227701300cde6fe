//! User repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{NewUser, User};
use crate::query::CommentRepository;
use crate::{PgClient, PgError, PgResult, schema};

/// Repository for user database operations.
pub trait UserRepository {
    /// Finds a user by its id.
    fn find_user(&self, user_id: i32) -> impl Future<Output = PgResult<User>> + Send;

    /// Finds a user by its unique username.
    ///
    /// Returns `None` when the name is unknown; lookup by name is a probe,
    /// not a contract.
    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;

    /// Returns all users, ordered by username.
    fn find_users(&self) -> impl Future<Output = PgResult<Vec<User>>> + Send;

    /// Inserts a new user and returns the stored row.
    fn create_user(&self, new_user: NewUser) -> impl Future<Output = PgResult<User>> + Send;

    /// Removes a user after soft-deleting everything they wrote.
    ///
    /// Authored comments go through the reply-chain cascade first, so their
    /// rows survive as deleted audit entries referencing the departed id.
    fn delete_user(&self, user_id: i32) -> impl Future<Output = PgResult<()>> + Send;
}

impl UserRepository for PgClient {
    async fn find_user(&self, user_id: i32) -> PgResult<User> {
        let mut conn = self.get_connection().await?;

        use schema::t_user::{self, dsl};

        t_user::table
            .filter(dsl::usr_id.eq(user_id))
            .select(User::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?
            .ok_or(PgError::UserNotFound(user_id))
    }

    async fn find_user_by_username(&self, username: &str) -> PgResult<Option<User>> {
        let mut conn = self.get_connection().await?;

        use schema::t_user::{self, dsl};

        let user = t_user::table
            .filter(dsl::usr_name.eq(username))
            .select(User::as_select())
            .first(&mut *conn)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(user)
    }

    async fn find_users(&self) -> PgResult<Vec<User>> {
        let mut conn = self.get_connection().await?;

        use schema::t_user::{self, dsl};

        let users = t_user::table
            .order(dsl::usr_name.asc())
            .select(User::as_select())
            .load(&mut *conn)
            .await
            .map_err(PgError::from)?;

        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> PgResult<User> {
        let mut conn = self.get_connection().await?;

        use schema::t_user;

        let user = diesel::insert_into(t_user::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(PgError::from)?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: i32) -> PgResult<()> {
        self.delete_author_comments(user_id).await?;

        let mut conn = self.get_connection().await?;

        use schema::t_user::{self, dsl};

        let removed = diesel::delete(t_user::table.filter(dsl::usr_id.eq(user_id)))
            .execute(&mut *conn)
            .await
            .map_err(PgError::from)?;

        if removed == 0 {
            return Err(PgError::UserNotFound(user_id));
        }

        Ok(())
    }
}
