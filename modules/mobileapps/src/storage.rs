//! REST storage backend for `MobileApp` objects.
//!
//! Persists through whatever object store the generic configuration
//! selected; the constructor takes the shared scheme and the server's
//! storage-options provider and can fail if the backend cannot be opened.

use std::sync::Arc;

use async_trait::async_trait;
use genapi::scheme::Scheme;
use genapi::storage::{ObjectStore, RestOptionsProvider, RestStorage, StorageError};
use serde_json::Value;

use crate::v1alpha1::{self, MobileApp};
use crate::{KIND, RESOURCE_PLURAL};

pub struct MobileAppStorage {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for MobileAppStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileAppStorage").finish_non_exhaustive()
    }
}

impl MobileAppStorage {
    /// Opens the backend for the `mobileapps` resource. Requires the kind to
    /// be installed in the scheme first; an unusable backend fails here.
    pub fn new(
        scheme: Arc<Scheme>,
        rest_options: &RestOptionsProvider,
    ) -> Result<Self, StorageError> {
        let gvk = v1alpha1::group_version().with_kind(KIND);
        if !scheme.recognizes(&gvk) {
            return Err(StorageError::Backend(format!(
                "kind {gvk} is not registered in the scheme"
            )));
        }
        let store = rest_options.object_store(RESOURCE_PLURAL)?;
        Ok(Self { store })
    }

    /// Typed decode; the wire layer has already defaulted and validated, this
    /// is the backend's own guard against malformed writes.
    fn decode(obj: &Value) -> Result<MobileApp, StorageError> {
        serde_json::from_value(obj.clone())
            .map_err(|e| StorageError::InvalidObject(format!("not a valid {KIND}: {e}")))
    }
}

#[async_trait]
impl RestStorage for MobileAppStorage {
    fn kind(&self) -> &str {
        KIND
    }

    async fn get(&self, name: &str) -> Result<Value, StorageError> {
        self.store
            .get(name)
            .await?
            .ok_or_else(|| StorageError::not_found(RESOURCE_PLURAL, name))
    }

    async fn list(&self) -> Result<Vec<Value>, StorageError> {
        self.store.list().await
    }

    async fn create(&self, obj: Value) -> Result<Value, StorageError> {
        let app = Self::decode(&obj)?;
        if app.metadata.name.is_empty() {
            return Err(StorageError::InvalidObject(
                "metadata.name must not be empty".to_owned(),
            ));
        }
        self.store.insert(&app.metadata.name, obj.clone()).await?;
        tracing::debug!(name = %app.metadata.name, "mobile app created");
        Ok(obj)
    }

    async fn update(&self, name: &str, obj: Value) -> Result<Value, StorageError> {
        let incoming = Self::decode(&obj)?;
        if incoming.metadata.name != name {
            return Err(StorageError::InvalidObject(format!(
                "metadata.name {:?} does not match {name:?}",
                incoming.metadata.name
            )));
        }

        let existing = self.get(name).await?;
        // server-assigned identity survives updates
        let mut obj = obj;
        if let Some(meta) = obj.pointer_mut("/metadata").and_then(Value::as_object_mut) {
            for field in ["uid", "creationTimestamp"] {
                if !meta.contains_key(field) {
                    if let Some(v) = existing.pointer(&format!("/metadata/{field}")) {
                        meta.insert(field.to_owned(), v.clone());
                    }
                }
            }
        }

        self.store.replace(name, obj.clone()).await?;
        Ok(obj)
    }

    async fn delete(&self, name: &str) -> Result<Value, StorageError> {
        let deleted = self.store.remove(name).await?;
        tracing::debug!(name = %name, "mobile app deleted");
        Ok(deleted)
    }
}
