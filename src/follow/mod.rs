mod graph;
mod recommend;

pub use self::graph::{candidate_ids, following_ids, is_following_in, FollowGraph};
pub use self::recommend::{sample_recommendations, RECOMMENDATION_COUNT};
