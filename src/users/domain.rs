// Validated input types and typed responses for the user directory
use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::restaurants::RestaurantSummary;

const NICKNAME_MAX_CHARS: usize = 20;

/// Static path segments under `/users/`; a nickname equal to one of them
/// could never be addressed as `/users/{nickname}`.
pub const RESERVED_NICKNAMES: &[&str] = &[
    "me",
    "search",
    "recommendations",
    "nickname-availability",
    "email-availability",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nickname(String);

impl Nickname {
    /// 1–20 characters after trimming, no inner whitespace.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Nickname is required".into()));
        }
        if trimmed.chars().count() > NICKNAME_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "Nickname must be {} characters or less",
                NICKNAME_MAX_CHARS
            )));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(
                "Nickname cannot contain spaces".into(),
            ));
        }
        if RESERVED_NICKNAMES.contains(&trimmed) {
            return Err(AppError::Validation(format!(
                "Nickname {} is reserved",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Birthdate in `YYYY/MM/DD` form that names a real calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthDate(String);

impl BirthDate {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        let shape_ok = trimmed.len() == 10
            && trimmed.bytes().enumerate().all(|(i, b)| match i {
                4 | 7 => b == b'/',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok || NaiveDate::parse_from_str(trimmed, "%Y/%m/%d").is_err() {
            return Err(AppError::Validation(
                "Birthdate must be a valid YYYY/MM/DD date".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

pub fn validate_email(raw: &str) -> AppResult<String> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(AppError::Validation("Email is not valid".into()));
    }
    Ok(email.to_string())
}

pub fn validate_region(raw: &str) -> AppResult<String> {
    let region = raw.trim();
    if region.is_empty() {
        return Err(AppError::Validation("Region is required".into()));
    }
    Ok(region.to_string())
}

/// Where an account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Site,
    Naver,
}

impl Provider {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim() {
            "" | "site" => Ok(Provider::Site),
            "naver" => Ok(Provider::Naver),
            other => Err(AppError::Validation(format!("Unknown provider: {}", other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Site => "site",
            Provider::Naver => "naver",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: Option<String>,
    pub nickname: Nickname,
    pub provider: Provider,
    pub region: String,
    pub birthdate: Option<BirthDate>,
}

/// What to do with the stored profile image on update.
#[derive(Debug, Clone, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Reset,
    Replace(Bytes),
}

/// Partial profile update: `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<Nickname>,
    pub region: Option<String>,
    pub birthdate: Option<BirthDate>,
    pub password: Option<String>,
    pub image: ImageChange,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_unique: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub region: String,
    pub profile_image: String,
    pub is_follow: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyInfo {
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub region: String,
    pub profile_image: String,
    pub follower: i64,
    pub following: i64,
    pub restaurant_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyDetail {
    pub email: String,
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub provider: String,
    pub region: String,
    pub birthdate: Option<String>,
    pub profile_image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUserInfo {
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub region: String,
    pub profile_image: String,
    pub is_follow: bool,
    pub restaurants: Vec<RestaurantSummary>,
}
