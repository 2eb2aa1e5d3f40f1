diesel::table! {
    members (id) {
        id -> Text,
        name -> Text,
        address -> Text,
        phone -> Text,
        aadhaar -> Text,
        occupation -> Text,
        dob -> Date,
        photo -> Nullable<Text>,
        exp -> Double,
    }
}

diesel::table! {
    photos (name) {
        name -> Text,
        value -> Text,
        mime_type -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(members, photos);
