//! Wire codecs derived from the scheme.
//!
//! A [`CodecFactory`] is a cheap, clonable, read-only view over an
//! `Arc<Scheme>`. Decoding resolves the object's `apiVersion`/`kind` pair,
//! rejects kinds the scheme does not know, and applies the registered
//! defaulting hook. Encoding refuses unregistered kinds the same way.

use std::sync::Arc;

use thiserror::Error;

use crate::scheme::{GroupVersion, GroupVersionKind, Scheme};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown kind: {0}")]
    UnknownKind(GroupVersionKind),

    #[error("object is missing apiVersion or kind")]
    MissingTypeMeta,

    #[error("{gvk} is invalid: {message}")]
    Invalid {
        gvk: GroupVersionKind,
        message: String,
    },

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Serializer/deserializer for every kind registered in the scheme.
#[derive(Debug, Clone)]
pub struct CodecFactory {
    scheme: Arc<Scheme>,
}

impl CodecFactory {
    #[must_use]
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self { scheme }
    }

    #[must_use]
    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Decodes a wire body into a recognized, defaulted object.
    pub fn decode(&self, data: &[u8]) -> Result<(GroupVersionKind, serde_json::Value), CodecError> {
        let obj: serde_json::Value = serde_json::from_slice(data)?;
        self.decode_value(obj)
    }

    /// Same as [`decode`](Self::decode) for an already-parsed value.
    pub fn decode_value(
        &self,
        mut obj: serde_json::Value,
    ) -> Result<(GroupVersionKind, serde_json::Value), CodecError> {
        let gvk = gvk_of(&obj)?;
        let Some(descriptor) = self.scheme.descriptor(&gvk) else {
            return Err(CodecError::UnknownKind(gvk));
        };
        if let Some(default_fn) = descriptor.default_fn {
            default_fn(&mut obj);
        }
        Ok((gvk, obj))
    }

    /// Serializes a registered object; unregistered kinds fail.
    pub fn encode(&self, obj: &serde_json::Value) -> Result<Vec<u8>, CodecError> {
        let gvk = gvk_of(obj)?;
        if !self.scheme.recognizes(&gvk) {
            return Err(CodecError::UnknownKind(gvk));
        }
        Ok(serde_json::to_vec(obj)?)
    }

    /// Runs the registered validation hook, if any.
    pub fn validate(
        &self,
        gvk: &GroupVersionKind,
        obj: &serde_json::Value,
    ) -> Result<(), CodecError> {
        if let Some(validate_fn) = self.scheme.descriptor(gvk).and_then(|d| d.validate_fn) {
            validate_fn(obj).map_err(|message| CodecError::Invalid {
                gvk: gvk.clone(),
                message,
            })?;
        }
        Ok(())
    }
}

/// Reads the type meta off a wire object.
pub fn gvk_of(obj: &serde_json::Value) -> Result<GroupVersionKind, CodecError> {
    let api_version = obj
        .get("apiVersion")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(CodecError::MissingTypeMeta)?;
    let kind = obj
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(CodecError::MissingTypeMeta)?;
    Ok(GroupVersion::parse(api_version).with_kind(kind))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::scheme::{SchemeBuilder, TypeDescriptor};
    use serde_json::json;

    fn fill_color(obj: &mut serde_json::Value) {
        if let Some(spec) = obj.pointer_mut("/spec").and_then(serde_json::Value::as_object_mut) {
            spec.entry("color").or_insert_with(|| json!("blue"));
        }
    }

    fn test_codecs() -> CodecFactory {
        let mut builder = SchemeBuilder::new();
        builder.register(
            GroupVersion::new("test.mobctl.dev", "v1").with_kind("Widget"),
            TypeDescriptor::new().with_defaulter(fill_color),
        );
        CodecFactory::new(builder.build())
    }

    #[test]
    fn decode_applies_registered_defaults() {
        let codecs = test_codecs();
        let body = json!({
            "apiVersion": "test.mobctl.dev/v1",
            "kind": "Widget",
            "metadata": {"name": "w1"},
            "spec": {}
        });

        let (gvk, obj) = codecs.decode_value(body).unwrap();
        assert_eq!(gvk.kind, "Widget");
        assert_eq!(obj.pointer("/spec/color"), Some(&json!("blue")));
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let codecs = test_codecs();
        let body = json!({"apiVersion": "test.mobctl.dev/v1", "kind": "Gadget"});

        let err = codecs.decode_value(body).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(_)), "{err}");
    }

    #[test]
    fn decode_rejects_missing_type_meta() {
        let codecs = test_codecs();
        let err = codecs.decode_value(json!({"metadata": {}})).unwrap_err();
        assert!(matches!(err, CodecError::MissingTypeMeta));
    }

    #[test]
    fn encode_rejects_unknown_kind() {
        let codecs = test_codecs();
        let obj = json!({"apiVersion": "v9", "kind": "Mystery"});
        let err = codecs.encode(&obj).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(_)));
    }
}
