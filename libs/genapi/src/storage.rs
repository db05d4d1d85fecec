//! The REST storage seam and the object stores behind it.
//!
//! [`RestStorage`] is the narrow boundary between the generic server and a
//! resource's backend: five async verbs over wire objects. Backends are
//! constructed through a [`RestOptionsProvider`], which resolves a per-resource
//! [`ObjectStore`] from whatever backend the generic configuration selected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} {name:?} already exists")]
    AlreadyExists { resource: String, name: String },

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("storage backend unavailable: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            name: name.into(),
        }
    }
}

/// Which persistence backend the generic configuration selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local, lost on exit. The default, and the test backend.
    #[default]
    Memory,
    /// One JSON document per object under `root/<resource>/`.
    File { root: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOptions {
    pub backend: StorageBackend,
}

/// Resolves object stores for resource storages; the storage-options provider
/// handed to every backend constructor.
#[derive(Debug, Clone)]
pub struct RestOptionsProvider {
    options: StorageOptions,
}

impl RestOptionsProvider {
    #[must_use]
    pub fn new(options: StorageOptions) -> Self {
        Self { options }
    }

    /// Opens the store for one resource. Fails when the configured backend
    /// cannot be brought up (e.g. the file root is not creatable).
    pub fn object_store(&self, resource: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        match &self.options.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStore::new(resource))),
            StorageBackend::File { root } => Ok(Arc::new(FileStore::open(resource, root)?)),
        }
    }
}

/// Keyed persistence for one resource's objects. Insert/replace are atomic
/// with respect to existence so REST create/update semantics hold under
/// concurrent requests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn list(&self) -> Result<Vec<Value>, StorageError>;
    /// Fails with `AlreadyExists` if the key is present.
    async fn insert(&self, key: &str, obj: Value) -> Result<(), StorageError>;
    /// Fails with `NotFound` if the key is absent.
    async fn replace(&self, key: &str, obj: Value) -> Result<(), StorageError>;
    /// Removes and returns the object; `NotFound` if absent.
    async fn remove(&self, key: &str) -> Result<Value, StorageError>;
}

/// The REST verbs the generic server dispatches to a resource backend.
/// Objects cross this boundary in wire form, which keeps the trait
/// mockable without standing up a server.
#[async_trait]
pub trait RestStorage: Send + Sync {
    /// Kind served by this storage, e.g. `MobileApp`.
    fn kind(&self) -> &str;

    async fn get(&self, name: &str) -> Result<Value, StorageError>;
    async fn list(&self) -> Result<Vec<Value>, StorageError>;
    async fn create(&self, obj: Value) -> Result<Value, StorageError>;
    async fn update(&self, name: &str, obj: Value) -> Result<Value, StorageError>;
    async fn delete(&self, name: &str) -> Result<Value, StorageError>;
}

pub struct MemoryStore {
    resource: String,
    objects: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Value>, StorageError> {
        Ok(self.objects.read().values().cloned().collect())
    }

    async fn insert(&self, key: &str, obj: Value) -> Result<(), StorageError> {
        let mut objects = self.objects.write();
        if objects.contains_key(key) {
            return Err(StorageError::already_exists(&self.resource, key));
        }
        objects.insert(key.to_owned(), obj);
        Ok(())
    }

    async fn replace(&self, key: &str, obj: Value) -> Result<(), StorageError> {
        let mut objects = self.objects.write();
        let Some(slot) = objects.get_mut(key) else {
            return Err(StorageError::not_found(&self.resource, key));
        };
        *slot = obj;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Value, StorageError> {
        self.objects
            .write()
            .remove(key)
            .ok_or_else(|| StorageError::not_found(&self.resource, key))
    }
}

#[derive(Debug)]
pub struct FileStore {
    resource: String,
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the per-resource directory. An unusable
    /// root surfaces here, which is where invalid storage configuration
    /// becomes a construction error.
    pub fn open(resource: &str, root: &Path) -> Result<Self, StorageError> {
        let dir = root.join(resource);
        std::fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Backend(format!("creating {}: {e}", dir.display())))?;
        Ok(Self {
            resource: resource.to_owned(),
            dir,
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\', '\0']) || key.starts_with('.') {
            return Err(StorageError::InvalidObject(format!(
                "invalid object name {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn backend_err(&self, what: &str, e: &std::io::Error) -> StorageError {
        StorageError::Backend(format!("{what} in {}: {e}", self.dir.display()))
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data).map_err(|e| {
                StorageError::Backend(format!("corrupt object {}: {e}", path.display()))
            })?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.backend_err("reading object", &e)),
        }
    }

    async fn list(&self) -> Result<Vec<Value>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.backend_err("listing objects", &e))?;
        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.backend_err("listing objects", &e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| self.backend_err("reading object", &e))?;
            let obj = serde_json::from_slice(&data).map_err(|e| {
                StorageError::Backend(format!("corrupt object {}: {e}", path.display()))
            })?;
            objects.push(obj);
        }
        // read_dir order is platform-dependent; keep listings stable by name
        objects.sort_by(|a, b| {
            let name = |v: &Value| {
                v.pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned()
            };
            name(a).cmp(&name(b))
        });
        Ok(objects)
    }

    async fn insert(&self, key: &str, obj: Value) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let data = serde_json::to_vec_pretty(&obj)
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        let mut open = tokio::fs::OpenOptions::new();
        open.write(true).create_new(true);
        match open.open(&path).await {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(&data)
                    .await
                    .map_err(|e| self.backend_err("writing object", &e))?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::already_exists(&self.resource, key))
            }
            Err(e) => Err(self.backend_err("writing object", &e)),
        }
    }

    async fn replace(&self, key: &str, obj: Value) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => return Err(StorageError::not_found(&self.resource, key)),
            Err(e) => return Err(self.backend_err("checking object", &e)),
        }
        let data = serde_json::to_vec_pretty(&obj)
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| self.backend_err("writing object", &e))
    }

    async fn remove(&self, key: &str) -> Result<Value, StorageError> {
        let existing = self
            .get(key)
            .await?
            .ok_or_else(|| StorageError::not_found(&self.resource, key))?;
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| self.backend_err("removing object", &e))?;
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn widget(name: &str) -> Value {
        json!({"apiVersion": "test/v1", "kind": "Widget", "metadata": {"name": name}})
    }

    #[tokio::test]
    async fn memory_store_create_semantics() {
        let store = MemoryStore::new("widgets");
        store.insert("w1", widget("w1")).await.unwrap();

        let err = store.insert("w1", widget("w1")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        assert_eq!(store.get("w1").await.unwrap(), Some(widget("w1")));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_replace_and_remove() {
        let store = MemoryStore::new("widgets");
        let err = store.replace("w1", widget("w1")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        store.insert("w1", widget("w1")).await.unwrap();
        store.replace("w1", widget("w1-updated")).await.unwrap();

        let removed = store.remove("w1").await.unwrap();
        assert_eq!(removed, widget("w1-updated"));
        assert!(store.remove("w1").await.is_err());
    }

    #[tokio::test]
    async fn file_store_round_trips_objects() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open("widgets", tmp.path()).unwrap();

        store.insert("w1", widget("w1")).await.unwrap();
        store.insert("w2", widget("w2")).await.unwrap();
        let err = store.insert("w1", widget("w1")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].pointer("/metadata/name"), Some(&json!("w1")));

        store.remove("w1").await.unwrap();
        assert_eq!(store.get("w1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_path_traversal_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open("widgets", tmp.path()).unwrap();

        let err = store.insert("../escape", widget("x")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidObject(_)));
    }

    #[test]
    fn file_store_open_fails_on_unusable_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("not-a-dir");
        std::fs::write(&file_path, b"occupied").unwrap();

        let err = FileStore::open("widgets", &file_path).unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[test]
    fn provider_resolves_configured_backend() {
        let provider = RestOptionsProvider::new(StorageOptions::default());
        assert!(provider.object_store("widgets").is_ok());

        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("occupied");
        std::fs::write(&file_path, b"x").unwrap();
        let provider = RestOptionsProvider::new(StorageOptions {
            backend: StorageBackend::File { root: file_path },
        });
        assert!(provider.object_store("widgets").is_err());
    }
}
