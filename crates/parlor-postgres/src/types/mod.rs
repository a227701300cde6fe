//! Contains constants, enumerations and other custom types.

pub mod constants;
mod constraints;
mod user_role;

pub use constraints::{
    ArticleConstraints, CommentConstraints, ConstraintCategory, ConstraintViolation,
    UserConstraints,
};
pub use user_role::UserRole;
