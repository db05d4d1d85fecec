//! The type scheme: a process-wide registry of resource kinds.
//!
//! A [`Scheme`] is built exactly once at process startup through a
//! [`SchemeBuilder`] and then shared as an immutable `Arc<Scheme>` with every
//! component that needs to recognize, default, or validate wire objects.
//! Nothing in this crate keeps scheme state in globals; the entry point owns
//! the builder and hands out the built scheme explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A registered API group/version pair. The core group uses an empty group
/// name and renders as just the version (`v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// The `apiVersion` wire form: `group/version`, or bare `version` for the
    /// core group.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parses the `apiVersion` wire form back into a group/version pair.
    #[must_use]
    pub fn parse(api_version: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version),
            None => Self::new("", api_version),
        }
    }

    #[must_use]
    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// Fully-qualified identity of a registered kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    #[must_use]
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.group_version(), self.kind)
    }
}

/// Defaulting hook applied to decoded objects of a kind.
pub type DefaultFn = fn(&mut serde_json::Value);

/// Validation hook; returns a human-readable reason on rejection.
pub type ValidateFn = fn(&serde_json::Value) -> Result<(), String>;

/// Structural description of a registered kind: the hooks the codec and REST
/// layers run on its objects. A plain descriptor (no hooks) is valid for
/// list and utility kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeDescriptor {
    pub default_fn: Option<DefaultFn>,
    pub validate_fn: Option<ValidateFn>,
}

impl TypeDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_defaulter(mut self, f: DefaultFn) -> Self {
        self.default_fn = Some(f);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, f: ValidateFn) -> Self {
        self.validate_fn = Some(f);
        self
    }
}

/// Mutable registration phase of the scheme. Consumed by [`build`].
///
/// [`build`]: SchemeBuilder::build
#[derive(Debug, Default)]
pub struct SchemeBuilder {
    types: BTreeMap<GroupVersionKind, TypeDescriptor>,
}

impl SchemeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind. Re-registering an already-known kind is a no-op:
    /// installers may legitimately run more than once per process (tests
    /// build several servers), and that must never fail or duplicate.
    pub fn register(&mut self, gvk: GroupVersionKind, descriptor: TypeDescriptor) {
        if self.types.contains_key(&gvk) {
            tracing::debug!(%gvk, "kind already registered, skipping");
            return;
        }
        self.types.insert(gvk, descriptor);
    }

    /// Registers a utility kind against the fixed internal group-version
    /// (`v1` with an empty group), used uniformly across all groups.
    pub fn register_unversioned(&mut self, kind: &str) {
        self.register(
            GroupVersion::new("", "v1").with_kind(kind),
            TypeDescriptor::new(),
        );
    }

    #[must_use]
    pub fn build(self) -> Arc<Scheme> {
        Arc::new(Scheme { types: self.types })
    }
}

/// Immutable catalog of registered kinds. Lives for the whole process.
#[derive(Debug)]
pub struct Scheme {
    types: BTreeMap<GroupVersionKind, TypeDescriptor>,
}

impl Scheme {
    #[must_use]
    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.types.contains_key(gvk)
    }

    #[must_use]
    pub fn descriptor(&self, gvk: &GroupVersionKind) -> Option<&TypeDescriptor> {
        self.types.get(gvk)
    }

    /// Kinds registered under one group/version, in stable order.
    #[must_use]
    pub fn kinds_for(&self, gv: &GroupVersion) -> Vec<&str> {
        self.types
            .keys()
            .filter(|k| k.group == gv.group && k.version == gv.version)
            .map(|k| k.kind.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_gvk() -> GroupVersionKind {
        GroupVersion::new("test.mobctl.dev", "v1").with_kind("Widget")
    }

    #[test]
    fn registration_is_idempotent() {
        let mut builder = SchemeBuilder::new();
        builder.register(widget_gvk(), TypeDescriptor::new());
        builder.register(widget_gvk(), TypeDescriptor::new());
        let scheme = builder.build();

        assert_eq!(scheme.len(), 1);
        assert!(scheme.recognizes(&widget_gvk()));
    }

    #[test]
    fn kinds_for_scopes_by_group_version() {
        let mut builder = SchemeBuilder::new();
        builder.register(widget_gvk(), TypeDescriptor::new());
        builder.register(
            GroupVersion::new("test.mobctl.dev", "v1").with_kind("WidgetList"),
            TypeDescriptor::new(),
        );
        builder.register_unversioned("Status");
        let scheme = builder.build();

        let gv = GroupVersion::new("test.mobctl.dev", "v1");
        assert_eq!(scheme.kinds_for(&gv), vec!["Widget", "WidgetList"]);
        assert_eq!(
            scheme.kinds_for(&GroupVersion::new("", "v1")),
            vec!["Status"]
        );
    }

    #[test]
    fn api_version_round_trips() {
        let gv = GroupVersion::new("test.mobctl.dev", "v1alpha1");
        assert_eq!(gv.api_version(), "test.mobctl.dev/v1alpha1");
        assert_eq!(GroupVersion::parse(&gv.api_version()), gv);

        let core = GroupVersion::new("", "v1");
        assert_eq!(core.api_version(), "v1");
        assert_eq!(GroupVersion::parse("v1"), core);
    }
}
