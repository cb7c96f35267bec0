mod aggregator;
mod types;
mod visits;

pub use self::aggregator::{
    representative_image_key, RestaurantListAggregator, ReviewScope, RECOMMENDED_LIMIT,
};
pub use self::types::*;
pub use self::visits::Visits;
