mod directory;
mod domain;

pub use self::directory::{UserDirectory, SEARCH_LIMIT};
pub use self::domain::*;
