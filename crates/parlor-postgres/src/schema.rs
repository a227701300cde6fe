// Table definitions for the comment store.
//
// Column names follow the legacy `t_*` naming of the site database; the
// models map them onto field names with `#[diesel(column_name = ...)]`.

pub mod sql_types {
    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "user_role"))]
    pub struct UserRole;
}

diesel::table! {
    t_article (art_id) {
        art_id -> Int4,
        art_title -> Varchar,
        art_content -> Text,
    }
}

diesel::table! {
    t_comment (com_id) {
        com_id -> Int4,
        art_id -> Int4,
        usr_id -> Int4,
        com_content -> Text,
        parent_id -> Int4,
        is_signaled -> Bool,
        is_deleted -> Bool,
        comment_date -> Date,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::UserRole;

    t_user (usr_id) {
        usr_id -> Int4,
        usr_name -> Varchar,
        usr_password -> Varchar,
        usr_role -> UserRole,
    }
}

diesel::joinable!(t_comment -> t_article (art_id));
diesel::joinable!(t_comment -> t_user (usr_id));

diesel::allow_tables_to_appear_in_same_query!(t_article, t_comment, t_user);
