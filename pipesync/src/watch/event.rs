//! Values exchanged with the orchestrator's list/watch API.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::WatchCursor;
use crate::errors::WatchError;

/// Kind of change carried by a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    /// The object was created.
    Added,
    /// The object changed.
    Modified,
    /// The object was removed.
    Deleted,
    /// Progress marker carrying only a resource version.
    Bookmark,
}

impl fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Bookmark => write!(f, "BOOKMARK"),
        }
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// The change kind.
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    /// The object after the change (before it, for deletions).
    pub object: Value,
}

impl WatchEvent {
    /// Creates an event.
    #[must_use]
    pub const fn new(event_type: WatchEventType, object: Value) -> Self {
        Self { event_type, object }
    }

    /// The object's `metadata.name`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        object_name(&self.object)
    }

    /// The object's `metadata.resourceVersion`.
    #[must_use]
    pub fn resource_version(&self) -> Option<WatchCursor> {
        self.object
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .map(WatchCursor::new)
    }
}

/// Returns an object's `metadata.name`.
#[must_use]
pub fn object_name(object: &Value) -> Option<&str> {
    object.pointer("/metadata/name").and_then(Value::as_str)
}

/// Result of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    /// Current objects.
    pub items: Vec<Value>,
    /// Version to start watching from.
    pub resource_version: WatchCursor,
}

/// One element of an open watch stream.
#[derive(Debug)]
pub enum StreamItem {
    /// A change notification.
    Event(WatchEvent),
    /// The cursor is too old to resume from.
    Stale,
    /// The stream broke.
    Failed(WatchError),
}

/// Stream of watch elements; ends when the server closes it (idle timeout).
pub type EventStream = BoxStream<'static, StreamItem>;

/// Result of opening a watch.
pub enum WatchOpen {
    /// The stream is open.
    Opened(EventStream),
    /// The cursor is too old to resume from.
    Stale,
}

impl fmt::Debug for WatchOpen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened(_) => f.write_str("Opened(..)"),
            Self::Stale => f.write_str("Stale"),
        }
    }
}
