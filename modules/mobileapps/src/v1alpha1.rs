//! `v1alpha1` types for the mobile group, plus the defaulting and validation
//! hooks registered with the scheme.

use genapi::meta::{ListMeta, ObjectMeta, TypeMeta};
use genapi::scheme::GroupVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GROUP_NAME, KIND};

pub const VERSION: &str = "v1alpha1";

#[must_use]
pub fn group_version() -> GroupVersion {
    GroupVersion::new(GROUP_NAME, VERSION)
}

/// Client platforms a mobile app can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientType {
    Cordova,
    Android,
    Ios,
}

impl ClientType {
    pub const ALL: [&'static str; 3] = ["cordova", "android", "ios"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileAppSpec {
    pub client_type: ClientType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Credential handed out to SDK clients; defaulted to a fresh UUID when
    /// omitted at create time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileApp {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: MobileAppSpec,
}

impl MobileApp {
    pub fn new(name: impl Into<String>, client_type: ClientType) -> Self {
        Self {
            type_meta: TypeMeta::new(group_version().api_version(), KIND),
            metadata: ObjectMeta {
                name: name.into(),
                ..ObjectMeta::default()
            },
            spec: MobileAppSpec {
                client_type,
                display_name: None,
                api_key: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileAppList {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<MobileApp>,
}

/// Defaulting hook: every app gets an API key at admission time unless the
/// caller supplied one.
pub(crate) fn default_mobile_app(obj: &mut Value) {
    if let Some(spec) = obj.pointer_mut("/spec").and_then(Value::as_object_mut) {
        spec.entry("apiKey")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    }
}

/// Validation hook: structural checks the storage backend relies on.
pub(crate) fn validate_mobile_app(obj: &Value) -> Result<(), String> {
    let name = obj
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if name.is_empty() {
        return Err("metadata.name must not be empty".to_owned());
    }

    let client_type = obj
        .pointer("/spec/clientType")
        .and_then(Value::as_str)
        .ok_or_else(|| "spec.clientType is required".to_owned())?;
    if !ClientType::ALL.contains(&client_type) {
        return Err(format!(
            "unsupported client type {client_type:?}, expected one of {:?}",
            ClientType::ALL
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn mobile_app_serializes_with_camel_case_wire_keys() {
        let mut app = MobileApp::new("notes", ClientType::Android);
        app.spec.display_name = Some("Notes".to_owned());

        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["apiVersion"], "mobile.mobctl.dev/v1alpha1");
        assert_eq!(value["kind"], "MobileApp");
        assert_eq!(value["metadata"]["name"], "notes");
        assert_eq!(value["spec"]["clientType"], "android");
        assert_eq!(value["spec"]["displayName"], "Notes");

        let back: MobileApp = serde_json::from_value(value).unwrap();
        assert_eq!(back, app);
    }

    #[test]
    fn defaulting_fills_api_key_once() {
        let mut obj = serde_json::to_value(MobileApp::new("notes", ClientType::Ios)).unwrap();
        default_mobile_app(&mut obj);
        let key = obj.pointer("/spec/apiKey").cloned().unwrap();
        assert!(!key.as_str().unwrap().is_empty());

        // a caller-supplied key is preserved
        default_mobile_app(&mut obj);
        assert_eq!(obj.pointer("/spec/apiKey"), Some(&key));
    }

    #[test]
    fn validation_rejects_unknown_client_type() {
        let obj = json!({
            "apiVersion": "mobile.mobctl.dev/v1alpha1",
            "kind": "MobileApp",
            "metadata": {"name": "notes"},
            "spec": {"clientType": "blackberry"}
        });
        let err = validate_mobile_app(&obj).unwrap_err();
        assert!(err.contains("blackberry"), "{err}");
    }

    #[test]
    fn validation_rejects_missing_name() {
        let obj = json!({
            "apiVersion": "mobile.mobctl.dev/v1alpha1",
            "kind": "MobileApp",
            "metadata": {},
            "spec": {"clientType": "cordova"}
        });
        assert!(validate_mobile_app(&obj).is_err());
    }
}
