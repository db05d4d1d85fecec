//! Assembly of the mobctl server: scheme construction, configuration
//! completion, and the wiring of the resource API group and the broker
//! surface onto one generic server container.

pub mod apiserver;
pub mod config;

pub use apiserver::{CompletedConfig, Config, MobileServer, build_scheme};
pub use config::AppConfig;
