//! Two-phase generic server configuration.
//!
//! [`GenericConfig`] is the mutable phase: callers set what they care about
//! and leave the rest unset. [`GenericConfig::complete`] fills required
//! defaults and returns a [`CompletedGenericConfig`], the only form the
//! server builder accepts. The completed type cannot be constructed directly;
//! the one escape hatch, [`CompletedGenericConfig::assume_complete`], is for
//! callers that have already satisfied every invariant themselves and is
//! exactly the contract a `SkipComplete` path needs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::storage::{RestOptionsProvider, StorageOptions};
use crate::version;

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8443);

/// Mutable generic-server configuration. Owned by the caller until completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericConfig {
    /// Listener address; completion defaults it to [`DEFAULT_BIND_ADDR`].
    pub bind_addr: Option<SocketAddr>,
    /// Persistence backend the resource storages will be built against.
    pub storage: StorageOptions,
    /// Version metadata reported on `/version`. Left unset, the endpoint
    /// serves a `NotFound` status.
    pub version: Option<version::Info>,
}

impl GenericConfig {
    #[must_use]
    pub fn new(storage: StorageOptions) -> Self {
        Self {
            bind_addr: None,
            storage,
            version: None,
        }
    }

    /// Fills unset required fields and seals the configuration. Completing a
    /// configuration whose defaults are already filled changes nothing.
    #[must_use]
    pub fn complete(mut self) -> CompletedGenericConfig {
        if self.bind_addr.is_none() {
            self.bind_addr = Some(DEFAULT_BIND_ADDR);
        }
        CompletedGenericConfig { inner: self }
    }
}

/// A generic configuration whose required defaults are known to be filled.
/// Only producible via [`GenericConfig::complete`] or, for callers that
/// guarantee the invariants hold, [`assume_complete`].
///
/// [`assume_complete`]: CompletedGenericConfig::assume_complete
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGenericConfig {
    inner: GenericConfig,
}

impl CompletedGenericConfig {
    /// Wraps a configuration without filling defaults. The caller asserts
    /// that every invariant the server builder relies on already holds;
    /// violations surface as construction failures, not here.
    #[must_use]
    pub fn assume_complete(config: GenericConfig) -> Self {
        Self { inner: config }
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.inner.bind_addr.unwrap_or(DEFAULT_BIND_ADDR)
    }

    #[must_use]
    pub fn version(&self) -> Option<&version::Info> {
        self.inner.version.as_ref()
    }

    #[must_use]
    pub fn storage(&self) -> &StorageOptions {
        &self.inner.storage
    }

    /// The storage-options provider resource backends are constructed from.
    #[must_use]
    pub fn rest_options(&self) -> RestOptionsProvider {
        RestOptionsProvider::new(self.inner.storage.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn complete_fills_bind_addr_default() {
        let completed = GenericConfig::new(StorageOptions::default()).complete();
        assert_eq!(completed.bind_addr(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn complete_preserves_explicit_settings() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().expect("addr");
        let mut config = GenericConfig::new(StorageOptions::default());
        config.bind_addr = Some(addr);
        config.version = Some(version::Info::new("2", "1"));

        let completed = config.complete();
        assert_eq!(completed.bind_addr(), addr);
        assert_eq!(completed.version().map(ToString::to_string), Some("2.1".to_owned()));
    }

    #[test]
    fn assume_complete_does_not_mutate() {
        let config = GenericConfig::new(StorageOptions::default());
        let snapshot = config.clone();

        let completed = CompletedGenericConfig::assume_complete(config);
        assert_eq!(completed.inner, snapshot);
        assert!(completed.version().is_none());
    }
}
