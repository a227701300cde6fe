//! Comment model for the discussion store.

use diesel::prelude::*;

use crate::schema::t_comment;
use crate::types::constants::comment::TOP_LEVEL_PARENT_ID;

/// A row of the `t_comment` table.
///
/// `parent_id` of [`TOP_LEVEL_PARENT_ID`] marks a direct reply to the
/// article; any other value references another comment's id. Deleted rows
/// stay in storage with `is_deleted` set, so they can keep an audit trail of
/// their own deleted children.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = t_comment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    /// Unique comment identifier, assigned by storage on insert.
    #[diesel(column_name = com_id)]
    pub id: i32,
    /// Owning article.
    #[diesel(column_name = art_id)]
    pub article_id: i32,
    /// Authoring user.
    #[diesel(column_name = usr_id)]
    pub author_id: i32,
    /// Comment text.
    #[diesel(column_name = com_content)]
    pub content: String,
    /// Parent comment id, or [`TOP_LEVEL_PARENT_ID`] for top-level comments.
    pub parent_id: i32,
    /// Flagged by a user for moderator review.
    pub is_signaled: bool,
    /// Soft-deleted: excluded from normal listings but retained in storage.
    pub is_deleted: bool,
    /// Date of first persistence; never changes afterwards.
    pub comment_date: jiff_diesel::Date,
}

/// Data for inserting a new comment.
///
/// The id, the comment date, and both moderation flags are storage-assigned;
/// a value of this type is the "never saved" state of a comment.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = t_comment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewComment {
    /// Owning article.
    #[diesel(column_name = art_id)]
    pub article_id: i32,
    /// Authoring user.
    #[diesel(column_name = usr_id)]
    pub author_id: i32,
    /// Comment text. Non-empty by caller contract; the store does not
    /// re-validate.
    #[diesel(column_name = com_content)]
    pub content: String,
    /// Parent comment id for replies.
    pub parent_id: i32,
}

/// Data for updating the mutable fields of an existing comment.
///
/// The comment date and id cannot appear here, which keeps them immutable
/// after the first save.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = t_comment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateComment {
    /// Comment text.
    #[diesel(column_name = com_content)]
    pub content: Option<String>,
    /// Parent comment id.
    pub parent_id: Option<i32>,
    /// Moderation flag.
    pub is_signaled: Option<bool>,
    /// Soft-deletion flag.
    pub is_deleted: Option<bool>,
}

impl Comment {
    /// Returns whether this is a top-level comment (a direct reply to the article).
    #[inline]
    pub fn is_top_level(&self) -> bool {
        self.parent_id == TOP_LEVEL_PARENT_ID
    }

    /// Returns whether this is a reply to another comment.
    #[inline]
    pub fn is_reply(&self) -> bool {
        !self.is_top_level()
    }

    /// Returns whether this comment sits in the moderation queue.
    #[inline]
    pub fn in_moderation_queue(&self) -> bool {
        self.is_signaled && !self.is_deleted
    }

    /// Returns the comment content, or `None` if the comment is soft-deleted.
    pub fn visible_content(&self) -> Option<&str> {
        if self.is_deleted {
            None
        } else {
            Some(&self.content)
        }
    }

    /// Returns the date of first persistence.
    pub fn date(&self) -> jiff::civil::Date {
        self.comment_date.into()
    }
}

impl NewComment {
    /// Creates a new top-level comment on an article.
    pub fn on_article(article_id: i32, author_id: i32, content: String) -> Self {
        Self {
            article_id,
            author_id,
            content,
            parent_id: TOP_LEVEL_PARENT_ID,
        }
    }

    /// Sets the parent comment id, turning this into a reply.
    pub fn as_reply_to(mut self, parent_id: i32) -> Self {
        self.parent_id = parent_id;
        self
    }
}

impl UpdateComment {
    /// Changeset flagging a comment for moderator review.
    pub fn signaled() -> Self {
        Self {
            is_signaled: Some(true),
            ..Self::default()
        }
    }

    /// Changeset marking a comment as soft-deleted.
    pub fn soft_deleted() -> Self {
        Self {
            is_deleted: Some(true),
            ..Self::default()
        }
    }

    /// Changeset replacing the comment text.
    pub fn content(content: String) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    /// Returns whether the changeset carries no field updates.
    ///
    /// Diesel rejects empty changesets, so callers check this first.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.parent_id.is_none()
            && self.is_signaled.is_none()
            && self.is_deleted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i32, parent_id: i32) -> Comment {
        Comment {
            id,
            article_id: 1,
            author_id: 1,
            content: format!("comment {id}"),
            parent_id,
            is_signaled: false,
            is_deleted: false,
            comment_date: jiff::civil::date(2025, 8, 20).into(),
        }
    }

    #[test]
    fn top_level_detection() {
        assert!(comment(1, TOP_LEVEL_PARENT_ID).is_top_level());
        assert!(comment(2, 1).is_reply());
        assert!(!comment(2, 1).is_top_level());
    }

    #[test]
    fn moderation_queue_membership() {
        let mut c = comment(5, 0);
        assert!(!c.in_moderation_queue());

        c.is_signaled = true;
        assert!(c.in_moderation_queue());

        c.is_deleted = true;
        assert!(!c.in_moderation_queue());
    }

    #[test]
    fn deleted_comment_hides_content() {
        let mut c = comment(3, 0);
        assert_eq!(c.visible_content(), Some("comment 3"));

        c.is_deleted = true;
        assert_eq!(c.visible_content(), None);
    }

    #[test]
    fn reply_builder_sets_parent() {
        let new_comment = NewComment::on_article(7, 2, "hello".into());
        assert_eq!(new_comment.parent_id, TOP_LEVEL_PARENT_ID);

        let reply = new_comment.as_reply_to(11);
        assert_eq!(reply.parent_id, 11);
        assert_eq!(reply.article_id, 7);
    }

    #[test]
    fn changeset_constructors() {
        assert_eq!(UpdateComment::signaled().is_signaled, Some(true));
        assert_eq!(UpdateComment::soft_deleted().is_deleted, Some(true));
        assert!(UpdateComment::default().is_empty());
        assert!(!UpdateComment::content("edit".into()).is_empty());
    }
}
