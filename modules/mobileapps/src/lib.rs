//! The `MobileApp` custom resource.
//!
//! One group (`mobile.mobctl.dev`), currently one version (`v1alpha1`), one
//! resource (`mobileapps`). [`install`] makes the kinds known to a scheme
//! builder; [`MobileAppStorage`] is the REST backend the server installs for
//! them.

pub mod install;
pub mod storage;
pub mod v1alpha1;

pub use install::install;
pub use storage::MobileAppStorage;

/// API group owning the mobile resources.
pub const GROUP_NAME: &str = "mobile.mobctl.dev";

/// Plural resource name on the wire.
pub const RESOURCE_PLURAL: &str = "mobileapps";

/// Kind of the single resource this group serves.
pub const KIND: &str = "MobileApp";
