//! Generic API-serving framework.
//!
//! `genapi` is the reusable half of the control plane: a process-wide type
//! scheme with wire codecs, Kubernetes-style meta and discovery types, a
//! two-phase server configuration, a narrow REST storage seam, and the
//! generic HTTP server that installs versioned API groups onto a single
//! axum router. Resource modules plug into it; they never reach around it.

pub mod codec;
pub mod config;
pub mod loopback;
pub mod meta;
mod rest;
pub mod scheme;
pub mod server;
pub mod storage;
pub mod version;

pub use codec::{CodecError, CodecFactory};
pub use config::{CompletedGenericConfig, GenericConfig};
pub use loopback::{ClientError, LoopbackClient};
pub use scheme::{GroupVersion, GroupVersionKind, Scheme, SchemeBuilder, TypeDescriptor};
pub use server::{ApiGroupInfo, GenericApiServer, ServerError};
pub use storage::{
    ObjectStore, RestOptionsProvider, RestStorage, StorageBackend, StorageError, StorageOptions,
};
