//! User model for comment attribution.

use diesel::prelude::*;

use crate::schema::t_user;
use crate::types::UserRole;

/// A row of the `t_user` table.
///
/// The password field holds an opaque hash owned by the authentication
/// layer; this crate never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = t_user)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    /// Unique user identifier.
    #[diesel(column_name = usr_id)]
    pub id: i32,
    /// Display and login name, unique across the site.
    #[diesel(column_name = usr_name)]
    pub username: String,
    /// Password hash.
    #[diesel(column_name = usr_password)]
    pub password: String,
    /// Site role.
    #[diesel(column_name = usr_role)]
    pub role: UserRole,
}

/// Data for inserting a new user.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = t_user)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser {
    /// Display and login name.
    #[diesel(column_name = usr_name)]
    pub username: String,
    /// Password hash.
    #[diesel(column_name = usr_password)]
    pub password: String,
    /// Site role.
    #[diesel(column_name = usr_role)]
    pub role: UserRole,
}

impl User {
    /// Returns whether this user may act on the moderation queue.
    #[inline]
    pub fn is_moderator(&self) -> bool {
        self.role.is_admin()
    }
}

impl NewUser {
    /// Creates a new regular user.
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            role: UserRole::User,
        }
    }

    /// Sets the role on the new user.
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }
}
