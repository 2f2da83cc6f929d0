//! Watched resource kinds and their resume cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespaced custom resource collection on the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKind {
    /// API group, e.g. `argoproj.io`.
    pub group: String,
    /// API version, e.g. `v1alpha1`.
    pub version: String,
    /// Namespace the collection lives in.
    pub namespace: String,
    /// Plural resource name, e.g. `workflows`.
    pub plural: String,
    /// Optional label selector applied to list and watch.
    #[serde(default)]
    pub label_selector: Option<String>,
}

impl ResourceKind {
    /// Creates a resource kind without a label selector.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            namespace: namespace.into(),
            plural: plural.into(),
            label_selector: None,
        }
    }

    /// Argo workflows in a namespace.
    #[must_use]
    pub fn workflows(namespace: impl Into<String>) -> Self {
        Self::new("argoproj.io", "v1alpha1", namespace, "workflows")
    }

    /// Seldon deployments in a namespace.
    #[must_use]
    pub fn seldon_deployments(namespace: impl Into<String>) -> Self {
        Self::new("machinelearning.seldon.io", "v1", namespace, "seldondeployments")
    }

    /// Sets the label selector.
    #[must_use]
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    /// The collection path relative to the API server root.
    #[must_use]
    pub fn api_path(&self) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, self.namespace, self.plural
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.plural, self.group, self.version)
    }
}

/// The last resource version seen for one kind.
///
/// Held in memory only; after a restart the session relists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchCursor(String);

impl WatchCursor {
    /// Wraps a resource version.
    #[must_use]
    pub fn new(resource_version: impl Into<String>) -> Self {
        Self(resource_version.into())
    }

    /// The resource version.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
