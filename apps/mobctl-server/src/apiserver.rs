//! The mobctl API server assembled from the generic pieces.
//!
//! Assembly runs in a fixed order: build the scheme, complete the
//! configuration, construct the generic container, install the mobile API
//! group, then mount the broker tree via the server's own loopback client.
//! A broker that cannot be mounted is reported and skipped; the resource API
//! stays up either way.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;

use genapi::codec::CodecFactory;
use genapi::config::{CompletedGenericConfig, GenericConfig};
use genapi::meta;
use genapi::scheme::{Scheme, SchemeBuilder};
use genapi::server::{ApiGroupInfo, GenericApiServer};
use genapi::version;

/// Builds the scheme every server instance shares: the unversioned meta
/// kinds plus the mobile group.
#[must_use]
pub fn build_scheme() -> (Arc<Scheme>, CodecFactory) {
    let mut builder = SchemeBuilder::new();
    meta::install_unversioned(&mut builder);
    mobileapps::install(&mut builder);
    let scheme = builder.build();
    let codecs = CodecFactory::new(scheme.clone());
    (scheme, codecs)
}

/// Server configuration before completion.
pub struct Config {
    pub generic: GenericConfig,
    pub scheme: Arc<Scheme>,
    pub codecs: CodecFactory,
    /// Prefix the broker tree is mounted under.
    pub broker_prefix: String,
}

impl Config {
    #[must_use]
    pub fn new(generic: GenericConfig) -> Self {
        let (scheme, codecs) = build_scheme();
        Self {
            generic,
            scheme,
            codecs,
            broker_prefix: broker::BROKER_API_PREFIX.to_owned(),
        }
    }

    /// Fills defaults and seals the configuration. The served version is
    /// pinned here unless the caller already set one.
    #[must_use]
    pub fn complete(mut self) -> CompletedConfig {
        if self.generic.version.is_none() {
            self.generic.version = Some(version::Info::new("1", "0"));
        }
        CompletedConfig {
            generic: self.generic.complete(),
            scheme: self.scheme,
            codecs: self.codecs,
            broker_prefix: self.broker_prefix,
        }
    }

    /// Seals the configuration without filling anything. For callers that
    /// have set every field themselves.
    #[must_use]
    pub fn skip_complete(self) -> CompletedConfig {
        CompletedConfig {
            generic: CompletedGenericConfig::assume_complete(self.generic),
            scheme: self.scheme,
            codecs: self.codecs,
            broker_prefix: self.broker_prefix,
        }
    }
}

pub struct CompletedConfig {
    pub generic: CompletedGenericConfig,
    pub scheme: Arc<Scheme>,
    pub codecs: CodecFactory,
    pub broker_prefix: String,
}

impl CompletedConfig {
    /// Builds the server: generic container, mobile API group, broker tree.
    pub fn build(self) -> anyhow::Result<MobileServer> {
        MobileServer::new(self)
    }
}

/// The assembled server; a handle over the generic container with everything
/// installed.
pub struct MobileServer {
    generic_server: GenericApiServer,
}

impl std::fmt::Debug for MobileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileServer").finish_non_exhaustive()
    }
}

impl MobileServer {
    pub fn new(config: CompletedConfig) -> anyhow::Result<Self> {
        let mut server =
            GenericApiServer::new(config.generic).context("building the generic API server")?;

        let storage = mobileapps::MobileAppStorage::new(config.scheme, server.rest_options())
            .context("building mobileapps storage")?;
        let mut group = ApiGroupInfo::new(mobileapps::v1alpha1::group_version(), config.codecs);
        group.add_resource(mobileapps::RESOURCE_PLURAL, Arc::new(storage));
        server
            .install_api_group(group)
            .context("installing the mobile API group")?;

        // The broker talks to the resource API just installed, through the
        // server's own loopback client. Broker failures never take down the
        // resource API.
        match server.loopback_client() {
            Ok(client) => {
                let ops = Arc::new(broker::BrokerOperations::new(client));
                if let Err(err) = server.mount(&config.broker_prefix, broker::router(ops)) {
                    tracing::error!(error = %err, "broker routes not mounted; continuing without the broker");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "loopback client unavailable; continuing without the broker");
            }
        }

        Ok(Self {
            generic_server: server,
        })
    }

    /// A snapshot of the assembled routes, mainly for in-process exercise.
    #[must_use]
    pub fn router(&self) -> Router {
        self.generic_server.router()
    }

    #[must_use]
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.generic_server.bind_addr()
    }

    /// Serves until the token is cancelled.
    pub async fn serve(self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.generic_server.serve(cancel).await
    }
}
