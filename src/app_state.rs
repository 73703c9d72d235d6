use std::sync::Arc;

use crate::{config::Config, data_seeder, feed::FeedEngine, store::BlogStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BlogStore>,
    pub feed: FeedEngine,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize store and schema
        let store = BlogStore::new(&config.database.url).await?;
        store.init().await?;
        let store = Arc::new(store);

        if config.seed_demo_data {
            data_seeder::seed(&store).await?;
        }

        let feed = FeedEngine::new(store.clone(), config.feed.page_size);

        Ok(Self {
            store,
            feed,
            config,
        })
    }
}
