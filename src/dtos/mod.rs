use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Member;

/// Text fields of a registration form, collected as they arrive.
#[derive(Debug, Default)]
pub struct MemberForm {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub aadhaar: Option<String>,
    pub occupation: Option<String>,
    pub dob: Option<String>,
    pub exp: Option<String>,
}

impl MemberForm {
    pub fn accepts(field: &str) -> bool {
        matches!(
            field,
            "name" | "address" | "phone" | "aadhaar" | "occupation" | "dob" | "exp"
        )
    }

    /// Stores a known field; anything else is dropped.
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "name" => &mut self.name,
            "address" => &mut self.address,
            "phone" => &mut self.phone,
            "aadhaar" => &mut self.aadhaar,
            "occupation" => &mut self.occupation,
            "dob" => &mut self.dob,
            "exp" => &mut self.exp,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Coerces the form into a member record with a fresh id.
    pub fn into_member(self, photo: Option<String>) -> Result<Member, AppError> {
        let dob = parse_dob(self.dob.as_deref().unwrap_or_default())
            .ok_or_else(|| AppError::bad_request("Invalid date of birth!"))?;
        let exp = required("exp", self.exp)?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|exp| exp.is_finite())
            .ok_or_else(|| AppError::bad_request("Invalid experience!"))?;

        Ok(Member {
            id: Uuid::new_v4().to_string(),
            name: required("name", self.name)?,
            address: required("address", self.address)?,
            phone: required("phone", self.phone)?,
            aadhaar: required("aadhaar", self.aadhaar)?,
            occupation: required("occupation", self.occupation)?,
            dob,
            photo,
            exp,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(format!("Missing {}!", field)))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeleteSummaryDto {
    #[serde(rename = "deletedCount")]
    pub deleted_count: usize,
    #[serde(rename = "deletedPhotos")]
    pub deleted_photos: usize,
}
