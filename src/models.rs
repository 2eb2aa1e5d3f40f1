use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{members, photos};

#[derive(Queryable, Insertable, Selectable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = members)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub aadhaar: String,
    pub occupation: String,
    pub dob: NaiveDate,
    pub photo: Option<String>,
    pub exp: f64,
}

/// Stored image. `value` holds the file bytes as standard base64.
#[derive(Queryable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = photos)]
pub struct Photo {
    pub name: String,
    pub value: String,
    pub mime_type: String,
}
