use std::path::PathBuf;
use tracing::{info, warn};

use crate::{Error, Result};

pub enum BackendKind {
    Redis,        // networked key-value store
    File,         // one file per key on the local filesystem
}

pub struct Config {
    pub backend: BackendKind,
    pub redis_url: String,
    /// Whether `redis_url` came from the environment rather than the default.
    pub redis_url_explicit: bool,
    pub cache_dir: Option<PathBuf>,
    pub format: Option<String>,
    pub counter_key: String,
}

impl Config {
    const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
    const DEFAULT_COUNTER_KEY: &str = "tag:id";

    /// Load a `.env` file if one exists, then read the process environment.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment variables from {}", path.display()),
            Err(_) => info!("No .env file found, using system environment variables"),
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match var("TACHE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("redis") => BackendKind::Redis,
            Some("file") => BackendKind::File,
            Some(other) => {
                return Err(Error::Config(format!(
                    "TACHE_BACKEND must be 'redis' or 'file', got '{other}'"
                )));
            }
        };

        let explicit_url = var("TACHE_REDIS_URL").filter(|url| !url.trim().is_empty());
        let redis_url_explicit = explicit_url.is_some();

        let counter_key = var("TACHE_COUNTER_KEY")
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_COUNTER_KEY.to_string());
        if counter_key != Self::DEFAULT_COUNTER_KEY {
            warn!(
                "TACHE_COUNTER_KEY is '{}', backends sharing a store with the default '{}' will not share keys",
                counter_key,
                Self::DEFAULT_COUNTER_KEY
            );
        }

        Ok(Self {
            backend,
            redis_url: explicit_url.unwrap_or_else(|| Self::DEFAULT_REDIS_URL.to_string()),
            redis_url_explicit,
            cache_dir: var("TACHE_CACHE_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            format: var("TACHE_FORMAT").filter(|format| !format.is_empty()),
            counter_key,
        })
    }
}

impl BackendKind {
    pub fn name(&self) -> &str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::File => "file",
        }
    }
}
