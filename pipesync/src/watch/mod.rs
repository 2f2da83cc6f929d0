//! Resumable watches against the orchestrator's list/watch API.
//!
//! This module provides:
//! - `ResourceKind` and `WatchCursor` for addressing a collection
//! - Tagged list/watch results where a stale cursor is data, not an error
//! - `WatchSession`, the INIT → LISTING → WATCHING state machine
//! - `KubeHttpApi`, a `reqwest` client (feature `kube-http`)

mod event;
mod resource;
mod session;

#[cfg(feature = "kube-http")]
mod http;

pub use event::{object_name, EventStream, ListResult, StreamItem, WatchEvent, WatchEventType, WatchOpen};
pub use resource::{ResourceKind, WatchCursor};
pub use session::{SessionState, WatchApi, WatchHandler, WatchSession};

#[cfg(feature = "kube-http")]
pub use http::KubeHttpApi;
