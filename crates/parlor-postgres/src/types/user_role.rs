//! User role enumeration for site accounts.

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Role of a site account.
///
/// Corresponds to the `USER_ROLE` PostgreSQL enum. Moderation operations
/// (the signaled feed, purges) are reserved for administrators by the
/// presentation layer; this crate only stores the role.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::UserRole"]
pub enum UserRole {
    /// Regular account: can comment and flag comments for review
    #[db_rename = "user"]
    #[serde(rename = "user")]
    #[strum(serialize = "user")]
    #[default]
    User,

    /// Administrator: reviews the moderation queue and removes content
    #[db_rename = "admin"]
    #[serde(rename = "admin")]
    #[strum(serialize = "admin")]
    Admin,
}

impl UserRole {
    /// Returns whether this role grants access to moderation operations.
    #[inline]
    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin)
    }
}
