use crate::domain::{COUNTER_KEY, Entry, Format};
use crate::ports::{Counter, StorageBackend};
use crate::serializer::Serializer;
use async_trait::async_trait;
use shared::{Error, Result};
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const TEMP_PREFIX: &str = ".tache-";

/// Backend keeping one file per key on the local filesystem.
///
/// The key is the file path (resolved under `root` when one is set) and the
/// file holds the encoded payload with no header. Expiry is carried in the
/// file's modification time, which is set to the instant the entry expires.
/// Writes are staged in a `.tache-*` temporary file in the same directory and
/// renamed into place.
///
/// `get_key` needs a shared atomic counter that the filesystem cannot provide,
/// so one is injected.
pub struct LocalBackend {
    counter: Arc<dyn Counter>,
    serializer: Serializer,
    root: Option<PathBuf>,
    counter_key: String,
}

impl LocalBackend {
    pub fn new(counter: Arc<dyn Counter>, format: Format) -> Self {
        Self {
            counter,
            serializer: Serializer::new(format),
            root: None,
            counter_key: COUNTER_KEY.to_string(),
        }
    }

    /// Resolve relative keys under `root` instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_counter_key(mut self, counter_key: impl Into<String>) -> Self {
        self.counter_key = counter_key.into();
        self
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        }
    }

    /// Read the payload and its expiry through one open handle
    async fn read_entry(&self, path: &Path) -> std::io::Result<(SystemTime, Vec<u8>)> {
        let mut file = tokio::fs::File::open(path).await?;
        let expires_at = file.metadata().await?.modified()?;
        let mut payload = Vec::new();
        file.read_to_end(&mut payload).await?;
        Ok((expires_at, payload))
    }

    /// Write into a temporary file next to `path`, then rename it over `path`.
    ///
    /// Readers see either the previous file or the complete new one, never a
    /// truncated file or one whose modification time is not yet the expiry.
    async fn write_payload(&self, path: &Path, entry: &Entry) -> Result<()> {
        let expires_at = SystemTime::now().checked_add(entry.ttl).ok_or_else(|| {
            Error::storage_io(
                path,
                std::io::Error::new(ErrorKind::InvalidInput, "ttl is out of range"),
            )
        })?;

        if self.serializer.format() == Format::Structured {
            std::str::from_utf8(&entry.payload).map_err(|e| {
                Error::Serialization(format!("structured payload is not text: {e}"))
            })?;
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::storage_io(dir, e))?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        file.write_all(&entry.payload)
            .await
            .map_err(|e| Error::storage_io(temp_path.to_path_buf(), e))?;
        file.flush()
            .await
            .map_err(|e| Error::storage_io(temp_path.to_path_buf(), e))?;
        file.into_std()
            .await
            .set_modified(expires_at)
            .map_err(|e| Error::storage_io(temp_path.to_path_buf(), e))?;

        temp_path
            .persist(path)
            .map_err(|e| Error::storage_io(path, e.error))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io(path, e)),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);

        let (expires_at, payload) = match self.read_entry(&path).await {
            Ok(entry) => entry,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage_io(&path, e)),
        };

        // Expired files stay until overwritten or deleted: unlinking by path
        // here could remove a file a concurrent `store` has just renamed in.
        if expires_at <= SystemTime::now() {
            debug!(key = key, "entry expired");
            return Ok(None);
        }

        if self.serializer.format() == Format::Structured {
            std::str::from_utf8(&payload).map_err(|e| {
                Error::Serialization(format!("{} is not valid text: {e}", path.display()))
            })?;
        }
        Ok(Some(payload))
    }

    async fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut payloads = Vec::with_capacity(keys.len());
        for key in keys {
            payloads.push(self.load(key).await?);
        }
        Ok(payloads)
    }

    async fn store(&self, entry: Entry) -> Result<()> {
        let path = self.path_for(&entry.key);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage_io(parent, e))?;
        }

        self.write_payload(&path, &entry).await
    }

    /// Writes files one at a time; a failure leaves the earlier files in place
    async fn store_many(&self, entries: Vec<Entry>) -> Result<()> {
        for entry in entries {
            self.store(entry).await?;
        }
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(&self.path_for(key)).await?;
        }
        Ok(())
    }

    async fn get_key(&self) -> Result<String> {
        let id = self.counter.incr(&self.counter_key).await?;
        Ok(id.to_string())
    }
}

impl Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("format", &self.serializer.format())
            .field("root", &self.root)
            .field("counter_key", &self.counter_key)
            .finish()
    }
}
