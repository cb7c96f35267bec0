use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Latest,
    Oldest,
    Name,
}

impl SortOrder {
    /// ORDER BY clause over a list table aliased `list` joined to `r`.
    pub(crate) fn clause(self) -> &'static str {
        match self {
            SortOrder::Latest => "list.created_at DESC, list.rowid DESC",
            SortOrder::Oldest => "list.created_at ASC, list.rowid ASC",
            SortOrder::Name => "r.name ASC, r.id ASC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Restaurant-name fragment
    pub name: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSummary {
    pub restaurant_id: i64,
    pub name: String,
    pub address: String,
    pub category: String,
    pub review_count: i64,
    /// Resolved URL of the representative image
    pub review_image: String,
    pub is_my: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishState {
    pub is_wish: bool,
}

/// A stored review as returned to its author, image resolved to a URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedReview {
    pub id: i64,
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

const RATING_MAX: i64 = 4;

/// Review submitted with a restaurant visit.
#[derive(Debug, Clone, Default)]
pub struct NewReview {
    pub is_car_visit: bool,
    pub car_visit_ability: Option<i64>,
    pub taste: i64,
    pub service: i64,
    pub restroom_cleanliness: i64,
    pub overall_experience: String,
}

impl NewReview {
    pub fn validate(&self) -> AppResult<()> {
        let ratings = [
            ("taste", Some(self.taste)),
            ("service", Some(self.service)),
            ("restroomCleanliness", Some(self.restroom_cleanliness)),
            ("carVisitAbility", self.car_visit_ability),
        ];
        for (field, value) in ratings {
            if let Some(v) = value {
                if !(0..=RATING_MAX).contains(&v) {
                    return Err(AppError::Validation(format!(
                        "{} must be between 0 and {}",
                        field, RATING_MAX
                    )));
                }
            }
        }
        Ok(())
    }
}
