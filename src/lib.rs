pub mod compaction;
pub mod config;
pub mod counters;
pub mod dayfilter;
pub mod error;
pub mod handlers;
pub mod httpresp;
pub mod ingest;
pub mod keys;
pub mod models;
pub mod modules;
pub mod parser;
pub mod render;
pub mod store;
pub mod summarizer;
pub mod timeaxis;

use std::sync::Arc;

use config::AppConfig;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<AppConfig>,
}
