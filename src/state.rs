use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::follow::FollowGraph;
use crate::restaurants::{RestaurantListAggregator, Visits};
use crate::storage::{ImageStore, ImageUrlResolver, LocalImageStore};
use crate::users::UserDirectory;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub images: Arc<dyn ImageStore>,
    pub users: UserDirectory,
    pub follows: FollowGraph,
    pub restaurants: RestaurantListAggregator,
    pub visits: Visits,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let images: Arc<dyn ImageStore> = Arc::new(LocalImageStore::new(config.uploads_path()));
        Self::with_image_store(db, config, images)
    }

    /// Build the state around a caller-supplied image store.
    pub fn with_image_store(
        db: DbPool,
        config: Config,
        images: Arc<dyn ImageStore>,
    ) -> anyhow::Result<Self> {
        let urls = ImageUrlResolver::new(&config.storage.public_url)?;

        let follows = FollowGraph::new(db.clone());
        let restaurants = RestaurantListAggregator::new(
            db.clone(),
            urls.clone(),
            config.lists.enrichment_workers,
        );
        let users = UserDirectory::new(
            db.clone(),
            images.clone(),
            urls.clone(),
            restaurants.clone(),
            config.auth.bcrypt_cost,
        );
        let visits = Visits::new(db.clone(), images.clone(), urls);

        Ok(Self {
            db,
            config,
            images,
            users,
            follows,
            restaurants,
            visits,
        })
    }
}
