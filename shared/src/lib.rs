// shared/src/lib.rs
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A value could not be encoded, or a cached payload could not be decoded.
    #[error("serialization: {0}")]
    Serialization(String),
    /// The networked store could not be reached or rejected a command.
    #[error("store communication: {0}")]
    StoreCommunication(String),
    #[error("storage i/o at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    pub fn storage_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
