//! Layered application configuration.
//!
//! Precedence, lowest to highest: built-in defaults, YAML file, environment
//! (`MOBCTL__` prefix, `__` as the section separator), CLI overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use genapi::config::GenericConfig;
use genapi::storage::{StorageBackend, StorageOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub broker: BrokerSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Listener address, `host:port`.
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8443".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageKind,
    /// Directory for the `file` backend; ignored by `memory`.
    pub root: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageKind::Memory,
            root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    pub prefix: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            prefix: broker::BROKER_API_PREFIX.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default tracing filter; `RUST_LOG` still wins when set.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then the YAML file when given, then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("MOBCTL__").split("__"))
            .extract()
            .context("loading configuration")
    }

    /// CLI flags override whatever the layered sources produced.
    pub fn apply_cli_overrides(&mut self, port: Option<u16>) {
        if let Some(port) = port {
            if let Ok(mut addr) = self.server.bind_addr.parse::<SocketAddr>() {
                addr.set_port(port);
                self.server.bind_addr = addr.to_string();
            }
        }
    }

    /// Translates the wire-level sections into the generic server config.
    pub fn generic_config(&self) -> anyhow::Result<GenericConfig> {
        let bind_addr: SocketAddr = self
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("invalid server.bind_addr {:?}", self.server.bind_addr))?;

        let backend = match self.storage.backend {
            StorageKind::Memory => StorageBackend::Memory,
            StorageKind::File => {
                let root = self
                    .storage
                    .root
                    .clone()
                    .context("storage.root is required for the file backend")?;
                StorageBackend::File { root }
            }
        };

        Ok(GenericConfig {
            bind_addr: Some(bind_addr),
            storage: StorageOptions { backend },
            version: None,
        })
    }

    /// Effective configuration, rendered for `--print-config`.
    pub fn render(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("rendering configuration")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_a_working_memory_server() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8443");
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert_eq!(config.broker.prefix, "/broker");

        let generic = config.generic_config().unwrap();
        assert_eq!(generic.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn yaml_and_env_layer_over_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "mobctl.yaml",
                r"
server:
  bind_addr: 0.0.0.0:9000
storage:
  backend: file
  root: /tmp/mobctl
",
            )?;
            jail.set_env("MOBCTL__BROKER__PREFIX", "/osb");

            let config = AppConfig::load(Some(Path::new("mobctl.yaml"))).expect("load");
            assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
            assert_eq!(config.storage.backend, StorageKind::File);
            assert_eq!(config.storage.root, Some(PathBuf::from("/tmp/mobctl")));
            assert_eq!(config.broker.prefix, "/osb");
            Ok(())
        });
    }

    #[test]
    fn cli_port_override_rewrites_the_listener() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(Some(7001));
        assert_eq!(config.server.bind_addr, "127.0.0.1:7001");
    }

    #[test]
    fn file_backend_requires_a_root() {
        let config = AppConfig {
            storage: StorageSection {
                backend: StorageKind::File,
                root: None,
            },
            ..AppConfig::default()
        };
        assert!(config.generic_config().is_err());
    }
}
