use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Column list matching [`User::from_row`].
pub const USER_COLUMNS: &str =
    "id, email, nickname, provider, region, birthdate, profile_image, password_hash, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub provider: String,
    pub region: String,
    pub birthdate: Option<String>,
    pub profile_image: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            nickname: row.get(2)?,
            provider: row.get(3)?,
            region: row.get(4)?,
            birthdate: row.get(5)?,
            profile_image: row.get(6)?,
            password_hash: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Column list matching [`Review::from_row`].
pub const REVIEW_COLUMNS: &str = "id, user_id, restaurant_id, is_car_visit, car_visit_ability, \
     taste, service, restroom_cleanliness, overall_experience, review_image, created_at";

#[derive(Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub user_id: String,
    pub restaurant_id: i64,
    pub is_car_visit: bool,
    pub car_visit_ability: Option<i64>,
    pub taste: i64,
    pub service: i64,
    pub restroom_cleanliness: i64,
    pub overall_experience: String,
    pub review_image: Option<String>,
    pub created_at: String,
}

impl Review {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            restaurant_id: row.get(2)?,
            is_car_visit: row.get(3)?,
            car_visit_ability: row.get(4)?,
            taste: row.get(5)?,
            service: row.get(6)?,
            restroom_cleanliness: row.get(7)?,
            overall_experience: row.get(8)?,
            review_image: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}
