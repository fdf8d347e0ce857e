//! Checks that the configured cache backend is reachable and round-trips values.

use shared::config::Config;
use std::time::Duration;
use storage_engine::build_backend;
use tache::{Backend, Lookup, StorageBackend};
use tracing::{Level, error, info};

const CHECK_KEY: &str = "tache-check/sample";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Config::load()?;
    let backend = build_backend(&config).await?;

    let token = backend.get_key().await?;
    backend.set(CHECK_KEY, &token, Duration::from_secs(30)).await?;

    match backend.get::<String>(CHECK_KEY).await? {
        Lookup::Hit(value) if value == token => {
            info!("Backend '{}' round-tripped token {}", config.backend.name(), token);
        }
        Lookup::Hit(value) => {
            error!("Check key read back '{}', expected '{}'", value, token);
            return Err("check value mismatch".into());
        }
        Lookup::Miss(_) => {
            error!("Check key {} missing right after write", CHECK_KEY);
            return Err("check value missing".into());
        }
    }

    backend.delete(&[CHECK_KEY]).await?;
    info!("Backend check passed");
    Ok(())
}
