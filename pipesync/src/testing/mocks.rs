//! Scripted fakes for the orchestrator API and watch handlers.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::errors::{PipesyncError, WatchError};
use crate::watch::{
    object_name, ListResult, ResourceKind, StreamItem, WatchApi, WatchCursor, WatchEvent, WatchEventType,
    WatchHandler, WatchOpen,
};

/// A scripted response to one watch call.
#[derive(Debug)]
pub enum ScriptedWatch {
    /// Open a stream yielding these items, then end it.
    Open(Vec<StreamItem>),
    /// Report a stale cursor on open.
    Stale,
    /// Fail the call.
    Error(WatchError),
}

impl ScriptedWatch {
    /// A stream of plain events.
    #[must_use]
    pub fn events(events: Vec<WatchEvent>) -> Self {
        Self::Open(events.into_iter().map(StreamItem::Event).collect())
    }
}

/// A call received by [`ScriptedWatchApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// A list call.
    List,
    /// A watch call from the given cursor.
    Watch(WatchCursor),
}

/// A [`WatchApi`] that replays queued responses and records every call.
///
/// Once the watch script runs out, the optional token is cancelled and an
/// empty stream is returned, so a session stops at its next reconnect point.
#[derive(Debug, Default)]
pub struct ScriptedWatchApi {
    lists: Mutex<VecDeque<Result<ListResult, WatchError>>>,
    watches: Mutex<VecDeque<ScriptedWatch>>,
    calls: Mutex<Vec<ApiCall>>,
    stop_token: Option<CancellationToken>,
}

impl ScriptedWatchApi {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a list response.
    #[must_use]
    pub fn with_list(self, response: Result<ListResult, WatchError>) -> Self {
        self.lists.lock().push_back(response);
        self
    }

    /// Queues a watch response.
    #[must_use]
    pub fn with_watch(self, response: ScriptedWatch) -> Self {
        self.watches.lock().push_back(response);
        self
    }

    /// Cancels `token` when the watch script is exhausted.
    #[must_use]
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.stop_token = Some(token);
        self
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WatchApi for ScriptedWatchApi {
    async fn list(&self, kind: &ResourceKind) -> Result<ListResult, WatchError> {
        self.calls.lock().push(ApiCall::List);
        self.lists
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(WatchError::fatal(kind.to_string(), "list script exhausted")))
    }

    async fn watch(
        &self,
        _kind: &ResourceKind,
        cursor: &WatchCursor,
        _timeout: Duration,
    ) -> Result<WatchOpen, WatchError> {
        self.calls.lock().push(ApiCall::Watch(cursor.clone()));
        let next = self.watches.lock().pop_front();
        match next {
            Some(ScriptedWatch::Open(items)) => Ok(WatchOpen::Opened(futures::stream::iter(items).boxed())),
            Some(ScriptedWatch::Stale) => Ok(WatchOpen::Stale),
            Some(ScriptedWatch::Error(error)) => Err(error),
            None => {
                if let Some(token) = &self.stop_token {
                    token.cancel("watch script exhausted");
                }
                Ok(WatchOpen::Opened(futures::stream::empty().boxed()))
            }
        }
    }
}

type FailureFn = Box<dyn Fn() -> PipesyncError + Send + Sync>;

/// A [`WatchHandler`] that keeps a name-keyed view of the collection.
///
/// Lists replace the view; events are applied on top of it.
#[derive(Default)]
pub struct RecordingHandler {
    view: Mutex<BTreeMap<String, Value>>,
    events: Mutex<Vec<WatchEvent>>,
    lists: Mutex<usize>,
    failure: Option<FailureFn>,
}

impl RecordingHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every event fail with the produced error.
    #[must_use]
    pub fn failing_with(mut self, failure: impl Fn() -> PipesyncError + Send + Sync + 'static) -> Self {
        self.failure = Some(Box::new(failure));
        self
    }

    /// Names of the delivered events, in order.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.name().map(str::to_string))
            .collect()
    }

    /// Number of lists delivered.
    #[must_use]
    pub fn list_count(&self) -> usize {
        *self.lists.lock()
    }

    /// The current view of the collection.
    #[must_use]
    pub fn view(&self) -> BTreeMap<String, Value> {
        self.view.lock().clone()
    }
}

impl std::fmt::Debug for RecordingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHandler")
            .field("events", &self.events.lock().len())
            .field("lists", &self.list_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WatchHandler for RecordingHandler {
    async fn on_event(&self, event: &WatchEvent) -> Result<(), PipesyncError> {
        if let Some(failure) = &self.failure {
            return Err(failure());
        }
        self.events.lock().push(event.clone());
        if let Some(name) = event.name() {
            let mut view = self.view.lock();
            match event.event_type {
                WatchEventType::Added | WatchEventType::Modified => {
                    view.insert(name.to_string(), event.object.clone());
                }
                WatchEventType::Deleted => {
                    view.remove(name);
                }
                WatchEventType::Bookmark => {}
            }
        }
        Ok(())
    }

    async fn on_listed(&self, items: &[Value]) -> Result<(), PipesyncError> {
        *self.lists.lock() += 1;
        *self.view.lock() = items
            .iter()
            .filter_map(|item| object_name(item).map(|name| (name.to_string(), item.clone())))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::modified;

    #[tokio::test]
    async fn test_recording_handler_view() {
        let handler = RecordingHandler::new();
        handler
            .on_listed(&[serde_json::json!({"metadata": {"name": "a"}})])
            .await
            .unwrap();
        handler.on_event(&modified("b", "2")).await.unwrap();
        let mut deleted = modified("a", "3");
        deleted.event_type = WatchEventType::Deleted;
        handler.on_event(&deleted).await.unwrap();

        assert_eq!(handler.view().keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(handler.event_names(), vec!["b", "a"]);
        assert_eq!(handler.list_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_api_exhaustion() {
        let token = CancellationToken::new();
        let api = ScriptedWatchApi::new().cancel_when_exhausted(token.clone());
        let kind = ResourceKind::workflows("anonymous");

        assert!(api.list(&kind).await.is_err());
        assert!(matches!(
            api.watch(&kind, &WatchCursor::new("1"), Duration::from_secs(1)).await,
            Ok(WatchOpen::Opened(_))
        ));
        assert!(token.is_cancelled());
        assert_eq!(api.calls(), vec![ApiCall::List, ApiCall::Watch(WatchCursor::new("1"))]);
    }
}
