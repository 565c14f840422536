//! Thin wrapper over an object store backend.
//!
//! The rest of the service works with string keys and JSON documents;
//! this wrapper adds JSON read/write, prefix listing and NotFound
//! classification over `object_store`. Backends: local filesystem in
//! production configuration, in-memory for tests.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use regolith_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Head-probe result used for conditional GET handling
#[derive(Debug, Clone)]
pub struct StoreMeta {
    pub e_tag: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub size: usize,
}

/// One listed object: key plus last-modified time
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub modified_unix_sec: i64,
}

#[derive(Clone)]
pub struct ContentStore {
    inner: Arc<dyn ObjectStore>,
}

impl ContentStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        ContentStore { inner }
    }

    /// Filesystem-backed store rooted at the given directory
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| Error::Config(format!("Bad store root {}: {}", root.display(), e)))?;
        Ok(ContentStore::new(Arc::new(fs)))
    }

    /// In-memory store for tests
    pub fn memory() -> Self {
        ContentStore::new(Arc::new(InMemory::new()))
    }

    pub async fn read_bytes(&self, key: &str) -> Result<Bytes> {
        let result = self.inner.get(&StorePath::from(key)).await?;
        Ok(result.bytes().await?)
    }

    pub async fn write_bytes(&self, key: &str, data: Bytes) -> Result<()> {
        self.inner.put(&StorePath::from(key), data.into()).await?;
        Ok(())
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.read_bytes(key).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Internal(format!("Failed to decode {}: {}", key, e)))
    }

    /// Read a JSON document, returning the default value when the key is absent
    pub async fn read_json_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.read_json(key).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_not_found() => Ok(T::default()),
            Err(err) => Err(err),
        }
    }

    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, Bytes::from(data)).await
    }

    /// Keys under a prefix. A missing prefix lists as empty.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_objects(prefix)
            .await?
            .into_iter()
            .map(|obj| obj.key)
            .collect())
    }

    /// Keys and modified times under a prefix
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let prefix_path = StorePath::from(prefix.trim_end_matches('/'));
        let listing: Vec<_> = match self
            .inner
            .list(Some(&prefix_path))
            .try_collect::<Vec<_>>()
            .await
        {
            Ok(metas) => metas,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(listing
            .into_iter()
            .map(|meta| ListedObject {
                key: meta.location.to_string(),
                modified_unix_sec: meta.last_modified.timestamp(),
            })
            .collect())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(&StorePath::from(key)).await?;
        Ok(())
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.inner
            .copy(&StorePath::from(from), &StorePath::from(to))
            .await?;
        Ok(())
    }

    pub async fn head(&self, key: &str) -> Result<StoreMeta> {
        let meta = self.inner.head(&StorePath::from(key)).await?;
        Ok(StoreMeta {
            e_tag: meta.e_tag,
            last_modified: meta.last_modified,
            size: meta.size,
        })
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
