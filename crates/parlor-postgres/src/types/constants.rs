//! Constants used throughout the crate.

/// Comment-related constants.
pub mod comment {
    /// `parent_id` value marking a comment as top-level (a direct reply to
    /// the article rather than to another comment).
    pub const TOP_LEVEL_PARENT_ID: i32 = 0;
}
