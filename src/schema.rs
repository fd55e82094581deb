// Diesel table definitions. Kept in step with `repository/schema_*.sql`.

diesel::table! {
    reply_records (id) {
        id -> Text,
        parent_id -> Text,
        author -> Text,
        author_followers -> BigInt,
        author_verified -> Bool,
        text -> Text,
        created_at -> Text,
        likes -> BigInt,
        retweets -> BigInt,
        processed -> Bool,
        response_id -> Nullable<Text>,
        processed_at -> Nullable<Text>,
        retry_count -> Integer,
        last_error -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    parent_messages (id) {
        id -> Text,
        author_handle -> Text,
        posted_at -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(parent_messages, reply_records);
