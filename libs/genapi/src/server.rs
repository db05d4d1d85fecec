//! The generic API server: one axum router container, versioned API groups
//! installed onto it, and extra route trees mounted beside them.
//!
//! Installation is all-or-nothing: a group's sub-router is assembled in full
//! before it is merged, so a server handed to a caller never exposes a
//! partially-installed group.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::codec::CodecFactory;
use crate::config::CompletedGenericConfig;
use crate::loopback::LoopbackClient;
use crate::meta::{
    ApiGroup, ApiGroupList, ApiResource, ApiResourceList, GroupVersionForDiscovery, TypeMeta,
};
use crate::rest::{self, ResourceCtx};
use crate::scheme::{GroupVersion, GroupVersionKind};
use crate::storage::{RestOptionsProvider, RestStorage};
use crate::version;

/// Path prefixes owned by the server itself; extension route trees may not
/// shadow them.
const RESERVED_PREFIXES: [&str; 3] = ["/apis", "/version", "/healthz"];

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("API group {0:?} is already installed")]
    GroupAlreadyInstalled(String),

    #[error("kind {0} is not registered in the scheme")]
    UnknownKind(GroupVersionKind),

    #[error("API group name must not be empty")]
    EmptyGroupName,

    #[error("invalid mount prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Descriptor for one group/version and the storage backend of each resource
/// in it. Built fresh per server, consumed by
/// [`GenericApiServer::install_api_group`].
pub struct ApiGroupInfo {
    group_version: GroupVersion,
    codecs: CodecFactory,
    resources: Vec<(String, Arc<dyn RestStorage>)>,
}

impl ApiGroupInfo {
    #[must_use]
    pub fn new(group_version: GroupVersion, codecs: CodecFactory) -> Self {
        Self {
            group_version,
            codecs,
            resources: Vec::new(),
        }
    }

    #[must_use]
    pub fn group_version(&self) -> &GroupVersion {
        &self.group_version
    }

    pub fn add_resource(&mut self, resource: impl Into<String>, storage: Arc<dyn RestStorage>) {
        self.resources.push((resource.into(), storage));
    }
}

/// Discovery documents for one installed group, shared with the `/apis`
/// handler so later installs show up without rebuilding routes.
struct InstalledGroup {
    group: ApiGroup,
}

type DiscoveryState = Arc<RwLock<Vec<InstalledGroup>>>;

struct GroupDiscovery {
    group: ApiGroup,
    resources: ApiResourceList,
}

pub struct GenericApiServer {
    router: Router,
    bind_addr: std::net::SocketAddr,
    version: Arc<Option<version::Info>>,
    rest_options: RestOptionsProvider,
    discovery: DiscoveryState,
}

impl GenericApiServer {
    /// Builds the server container with its base discovery routes. API groups
    /// and extension trees are grafted on afterwards.
    pub fn new(config: CompletedGenericConfig) -> Result<Self, ServerError> {
        let discovery: DiscoveryState = Arc::new(RwLock::new(Vec::new()));
        let version = Arc::new(config.version().cloned());

        let router = Router::new()
            .route("/healthz", get(healthz))
            .merge(
                Router::new()
                    .route("/version", get(serve_version))
                    .with_state(version.clone()),
            )
            .merge(
                Router::new()
                    .route("/apis", get(serve_api_groups))
                    .with_state(discovery.clone()),
            );

        Ok(Self {
            router,
            bind_addr: config.bind_addr(),
            version,
            rest_options: config.rest_options(),
            discovery,
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.bind_addr
    }

    /// The storage-options provider resource backends are constructed from.
    #[must_use]
    pub fn rest_options(&self) -> &RestOptionsProvider {
        &self.rest_options
    }

    /// A snapshot of the route container, mainly for in-process exercise.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Installs a versioned API group. After this returns Ok the group's
    /// resources are reachable under `/apis/<group>/<version>/...`; on error
    /// the container is untouched.
    pub fn install_api_group(&mut self, info: ApiGroupInfo) -> Result<(), ServerError> {
        let gv = info.group_version.clone();
        if gv.group.is_empty() {
            return Err(ServerError::EmptyGroupName);
        }
        if self
            .discovery
            .read()
            .iter()
            .any(|installed| installed.group.name == gv.group)
        {
            return Err(ServerError::GroupAlreadyInstalled(gv.group));
        }

        // Resolve everything fallible before touching the container.
        let mut group_router = Router::new();
        let mut api_resources = Vec::new();
        for (resource, storage) in info.resources {
            let gvk = gv.with_kind(storage.kind());
            if !info.codecs.scheme().recognizes(&gvk) {
                return Err(ServerError::UnknownKind(gvk));
            }
            api_resources.push(ApiResource {
                name: resource.clone(),
                kind: storage.kind().to_owned(),
                namespaced: false,
                verbs: ["get", "list", "create", "update", "delete"]
                    .map(str::to_owned)
                    .to_vec(),
            });
            let ctx = Arc::new(ResourceCtx {
                storage,
                codecs: info.codecs.clone(),
                gvk,
                resource,
            });
            group_router = group_router.merge(rest::resource_router(ctx));
        }

        let for_discovery = GroupVersionForDiscovery {
            group_version: gv.api_version(),
            version: gv.version.clone(),
        };
        let group_doc = ApiGroup {
            type_meta: TypeMeta::new("v1", "APIGroup"),
            name: gv.group.clone(),
            versions: vec![for_discovery.clone()],
            preferred_version: Some(for_discovery),
        };
        let resources_doc = ApiResourceList {
            type_meta: TypeMeta::new("v1", "APIResourceList"),
            group_version: gv.api_version(),
            resources: api_resources,
        };

        group_router = group_router.merge(
            Router::new()
                .route(&format!("/apis/{}", gv.group), get(serve_group))
                .route(
                    &format!("/apis/{}/{}", gv.group, gv.version),
                    get(serve_group_resources),
                )
                .with_state(Arc::new(GroupDiscovery {
                    group: group_doc.clone(),
                    resources: resources_doc,
                })),
        );

        let container = std::mem::take(&mut self.router);
        self.router = container.merge(group_router);
        self.discovery.write().push(InstalledGroup { group: group_doc });

        tracing::info!(group = %gv.group, version = %gv.version, "installed API group");
        Ok(())
    }

    /// Mounts an extension route tree under a dedicated prefix on the same
    /// container the API groups are served from.
    pub fn mount(&mut self, prefix: &str, routes: Router) -> Result<(), ServerError> {
        validate_prefix(prefix)?;
        let container = std::mem::take(&mut self.router);
        self.router = container.nest(prefix, routes);
        tracing::info!(prefix = %prefix, "mounted extension routes");
        Ok(())
    }

    /// An in-process client over the container as currently assembled. Valid
    /// because client and server share a process; no network hop involved.
    pub fn loopback_client(&self) -> Result<LoopbackClient, ServerError> {
        Ok(LoopbackClient::new(self.router.clone()))
    }

    /// Binds the configured address and serves until the token is cancelled.
    pub async fn serve(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, version = ?self.version, "HTTP server bound");

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        };

        axum::serve(listener, self.router.layer(TraceLayer::new_for_http()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}

fn validate_prefix(prefix: &str) -> Result<(), ServerError> {
    let invalid = |reason: &str| ServerError::InvalidPrefix {
        prefix: prefix.to_owned(),
        reason: reason.to_owned(),
    };
    if !prefix.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if prefix.len() < 2 {
        return Err(invalid("must name a path segment"));
    }
    if prefix.ends_with('/') {
        return Err(invalid("must not end with '/'"));
    }
    if prefix.contains(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    for reserved in RESERVED_PREFIXES {
        if prefix == reserved || prefix.starts_with(&format!("{reserved}/")) {
            return Err(invalid("prefix is reserved by the API server"));
        }
    }
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn serve_version(State(info): State<Arc<Option<version::Info>>>) -> Response {
    match info.as_ref() {
        Some(info) => Json(info.clone()).into_response(),
        None => rest::status_response(
            axum::http::StatusCode::NOT_FOUND,
            "NotFound",
            "server version metadata is not set".to_owned(),
        ),
    }
}

async fn serve_api_groups(State(discovery): State<DiscoveryState>) -> Json<ApiGroupList> {
    let groups = discovery
        .read()
        .iter()
        .map(|installed| installed.group.clone())
        .collect();
    Json(ApiGroupList {
        type_meta: TypeMeta::new("v1", "APIGroupList"),
        groups,
    })
}

async fn serve_group(State(discovery): State<Arc<GroupDiscovery>>) -> Json<ApiGroup> {
    Json(discovery.group.clone())
}

async fn serve_group_resources(
    State(discovery): State<Arc<GroupDiscovery>>,
) -> Json<ApiResourceList> {
    Json(discovery.resources.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_validation() {
        assert!(validate_prefix("/broker").is_ok());
        assert!(validate_prefix("/broker/v2").is_ok());

        assert!(validate_prefix("broker").is_err());
        assert!(validate_prefix("/").is_err());
        assert!(validate_prefix("/broker/").is_err());
        assert!(validate_prefix("/bro ker").is_err());
        assert!(validate_prefix("/apis").is_err());
        assert!(validate_prefix("/apis/ext").is_err());
        assert!(validate_prefix("/version").is_err());
    }
}
