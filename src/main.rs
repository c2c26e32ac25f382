// src/main.rs
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use warehouse_optimizer::api::{self, ApiState};
use warehouse_optimizer::config::{AppConfig, StoreConfig};
use warehouse_optimizer::recommender::HeuristicRecommender;
use warehouse_optimizer::store::{JsonFileStore, MemoryStore, ResultStore};

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn open_store(config: &StoreConfig) -> Option<Arc<dyn ResultStore>> {
    if !config.enabled() {
        info!("Result persistence disabled");
        return None;
    }
    match config.dir() {
        Some(dir) => match JsonFileStore::open(dir) {
            Ok(store) => {
                info!(dir = %store.dir().display(), "Storing sessions on disk");
                Some(Arc::new(store))
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Could not open store directory, keeping sessions in memory");
                Some(Arc::new(MemoryStore::new()))
            }
        },
        None => Some(Arc::new(MemoryStore::new())),
    }
}

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();
    enable_tracing();
    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!(error = %err, "Could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    let state = ApiState::new(app_config.optimizer.clone())
        .with_recommender(Arc::new(HeuristicRecommender));
    let state = match open_store(&app_config.store) {
        Some(store) => state.with_store(store),
        None => state,
    };

    info!("Warehouse optimizer starting...");
    if let Err(err) = api::start_api_server(app_config.api.clone(), state).await {
        error!(error = %err, "API server terminated with an error");
        std::process::exit(1);
    }
}
