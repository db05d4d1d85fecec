//! Kubernetes-style meta and discovery types.
//!
//! These are the utility kinds every installed group relies on: object and
//! list metadata, the `Status` wire error, and the discovery documents served
//! under `/apis`. [`install_unversioned`] registers them against the fixed
//! internal group-version so the generic server can serve them uniformly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheme::SchemeBuilder;

/// Kinds registered against the internal `""/v1` group-version.
pub const UNVERSIONED_KINDS: [&str; 5] = [
    "Status",
    "APIVersions",
    "APIGroup",
    "APIGroupList",
    "APIResourceList",
];

/// Registers the utility kinds the generic server needs to serve any group.
/// Safe to call more than once per process.
pub fn install_unversioned(builder: &mut SchemeBuilder) {
    for kind in UNVERSIONED_KINDS {
        builder.register_unversioned(kind);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

/// Wire form for request outcomes, served with the matching HTTP code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl Status {
    fn typed() -> TypeMeta {
        TypeMeta::new("v1", "Status")
    }

    #[must_use]
    pub fn failure(reason: impl Into<String>, message: impl Into<String>, code: u16) -> Self {
        Self {
            type_meta: Self::typed(),
            metadata: ListMeta::default(),
            status: "Failure".to_owned(),
            message: message.into(),
            reason: reason.into(),
            code,
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            type_meta: Self::typed(),
            metadata: ListMeta::default(),
            status: "Success".to_owned(),
            message: message.into(),
            reason: String::new(),
            code: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersions {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionForDiscovery {
    pub group_version: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroup {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub name: String,
    pub versions: Vec<GroupVersionForDiscovery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_version: Option<GroupVersionForDiscovery>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroupList {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub groups: Vec<ApiGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    pub kind: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::scheme::{GroupVersion, SchemeBuilder};

    #[test]
    fn unversioned_kinds_install_once() {
        let mut builder = SchemeBuilder::new();
        install_unversioned(&mut builder);
        install_unversioned(&mut builder);
        let scheme = builder.build();

        let core = GroupVersion::new("", "v1");
        assert_eq!(scheme.kinds_for(&core).len(), UNVERSIONED_KINDS.len());
        assert!(scheme.recognizes(&core.with_kind("Status")));
    }

    #[test]
    fn status_failure_serializes_with_type_meta() {
        let status = Status::failure("NotFound", "widget \"w1\" not found", 404);
        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Status");
        assert_eq!(value["status"], "Failure");
        assert_eq!(value["reason"], "NotFound");
        assert_eq!(value["code"], 404);
    }
}
