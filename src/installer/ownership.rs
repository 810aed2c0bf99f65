//! # Resource Ownership
//!
//! Decides which live cluster objects belong to a plugin.
//!
//! Ownership is recorded by a single annotation,
//! [`MANAGED_PLUGIN_ANNOTATION`], whose value is `<namespace>/<name>` of the
//! owning plugin. The selector built here is the only thing that scopes
//! selection and pruning; nothing else associates objects with a plugin.

use crate::constants::MANAGED_PLUGIN_ANNOTATION;
use kube::api::DynamicObject;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&DynamicObject) -> bool + Send + Sync;

/// Predicate selecting the live objects managed by one applier call
///
/// The default selector selects nothing, so an applier without a selector can
/// never adopt or prune unrelated resources.
#[derive(Clone, Default)]
pub struct ResourceSelector {
    predicate: Option<Arc<Predicate>>,
}

impl fmt::Debug for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSelector")
            .field("configured", &self.predicate.is_some())
            .finish()
    }
}

impl ResourceSelector {
    /// Selector that matches nothing
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Selector backed by an arbitrary predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&DynamicObject) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Selector for objects stamped as owned by plugin `namespace/name`
    pub fn by_plugin(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        Self::custom(move |obj| is_owned_by(obj, &namespace, &name))
    }

    #[must_use]
    pub fn select(&self, obj: &DynamicObject) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(obj))
    }
}

/// Whether `obj` carries the ownership annotation of plugin `namespace/name`
///
/// The annotation value is split on the first `/`; both halves must match
/// exactly. A missing or malformed annotation is never an error, it just does
/// not match.
#[must_use]
pub fn is_owned_by(obj: &DynamicObject, namespace: &str, name: &str) -> bool {
    owner_of(obj).is_some_and(|(ns, n)| ns == namespace && n == name)
}

/// Owner recorded on `obj`, as `(namespace, name)`
#[must_use]
pub fn owner_of(obj: &DynamicObject) -> Option<(&str, &str)> {
    obj.metadata
        .annotations
        .as_ref()?
        .get(MANAGED_PLUGIN_ANNOTATION)?
        .split_once('/')
}

/// Stamp every manifest with the ownership annotation of `namespace/name`
///
/// Existing annotations are preserved; a previous owner value is overwritten.
pub fn stamp_ownership(manifests: &mut [DynamicObject], namespace: &str, name: &str) {
    let owner = format!("{namespace}/{name}");
    for manifest in manifests {
        manifest
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(MANAGED_PLUGIN_ANNOTATION.to_string(), owner.clone());
    }
}
