use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

/// Top-level directory a blob is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Attachments,
    Pictures,
}

impl Namespace {
    pub fn dir(&self) -> &'static str {
        match self {
            Self::Attachments => "attachments",
            Self::Pictures => "pictures",
        }
    }
}

/// Where a blob landed and what was written.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Path relative to the store root, e.g. `attachments/<uuid>.png`.
    pub stored_path: String,
    pub size: u64,
    pub sha256: String,
}

/// A file ready to be served, with the metadata the facade needs for headers.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub filename: String,
    pub content_type: String,
    pub sha256: Option<String>,
    pub bytes: Vec<u8>,
}

/// Filesystem-like store for attachment and picture bytes. Writes are not
/// part of any database transaction.
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under a freshly generated name in `namespace`, keeping
    /// `original_name`'s extension.
    fn put(&self, namespace: Namespace, original_name: &str, bytes: &[u8]) -> Result<StoredBlob>;

    /// Read a blob back. `None` when it is missing.
    fn read(&self, stored_path: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a blob. Deleting a missing blob is not an error.
    fn delete(&self, stored_path: &str) -> Result<()>;
}

/// Stores each blob as a flat file at `{root}/{namespace}/{uuid}{.ext}`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for namespace in [Namespace::Attachments, Namespace::Pictures] {
            fs::create_dir_all(root.join(namespace.dir()))?;
        }
        info!("Blob storage directory: {}", root.display());
        Ok(Self { root })
    }

    /// Resolve a stored relative path, refusing anything that could escape
    /// the root.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf> {
        let relative = Path::new(stored_path);
        let safe = !stored_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            bail!("Refusing unsafe blob path '{}'", stored_path);
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, namespace: Namespace, original_name: &str, bytes: &[u8]) -> Result<StoredBlob> {
        let file_name = match extension_of(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };
        let stored_path = format!("{}/{}", namespace.dir(), file_name);

        fs::write(self.resolve(&stored_path)?, bytes)?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);

        Ok(StoredBlob {
            stored_path,
            size: bytes.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    fn read(&self, stored_path: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(stored_path)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, stored_path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(stored_path)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Blob {} already gone", stored_path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Lowercased extension of an uploaded file name, if it is a plain
/// alphanumeric one.
pub fn extension_of(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Best-effort removal of blobs whose rows are gone (or never committed).
pub(crate) fn discard(blobs: &dyn BlobStore, stored_paths: &[String]) {
    for path in stored_paths {
        if let Err(e) = blobs.delete(path) {
            warn!("Failed to remove blob {}: {}", path, e);
        }
    }
}
