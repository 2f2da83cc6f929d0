//! Resumable list/watch loop.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ListResult, ResourceKind, StreamItem, WatchCursor, WatchEvent, WatchEventType, WatchOpen};
use crate::cancellation::CancellationToken;
use crate::errors::{PipesyncError, WatchError};

/// The orchestrator's Kubernetes-shaped list/watch API.
///
/// A stale cursor is reported as data ([`WatchOpen::Stale`] or
/// [`StreamItem::Stale`]), never as an error.
#[async_trait]
pub trait WatchApi: Send + Sync {
    /// Lists the collection and returns the version to watch from.
    async fn list(&self, kind: &ResourceKind) -> Result<ListResult, WatchError>;

    /// Opens a watch from `cursor`. The server ends the stream after `timeout`.
    async fn watch(
        &self,
        kind: &ResourceKind,
        cursor: &WatchCursor,
        timeout: Duration,
    ) -> Result<WatchOpen, WatchError>;
}

/// Receives a session's output in delivery order.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    /// Called with every event, one at a time.
    ///
    /// [`PipesyncError::Manifest`] skips the event; any other error ends the
    /// session with a transient error and the event is redelivered on resume.
    async fn on_event(&self, event: &WatchEvent) -> Result<(), PipesyncError>;

    /// Called with the full collection after every list, including relists
    /// after a stale cursor.
    async fn on_listed(&self, _items: &[Value]) -> Result<(), PipesyncError> {
        Ok(())
    }
}

/// Where a [`WatchSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started.
    Init,
    /// Fetching the collection and a fresh cursor.
    Listing,
    /// Streaming events from the cursor.
    Watching,
    /// Stopped by an error; [`WatchSession::run`] may be called again.
    Failed,
}

/// A reconnecting watch over one resource kind.
///
/// Idle stream ends reopen the watch with the same cursor. A stale cursor
/// triggers a relist. Cancellation is checked between reconnects only; the
/// session never retries errors itself.
pub struct WatchSession<A: WatchApi + ?Sized> {
    api: Arc<A>,
    kind: ResourceKind,
    timeout: Duration,
    token: CancellationToken,
    state: SessionState,
    cursor: Option<WatchCursor>,
    events_seen: u64,
}

impl<A: WatchApi + ?Sized> WatchSession<A> {
    /// Creates a session that starts by listing.
    #[must_use]
    pub fn new(api: Arc<A>, kind: ResourceKind, timeout: Duration, token: CancellationToken) -> Self {
        Self {
            api,
            kind,
            timeout,
            token,
            state: SessionState::Init,
            cursor: None,
            events_seen: 0,
        }
    }

    /// Starts watching from a known cursor instead of listing.
    #[must_use]
    pub fn with_cursor(mut self, cursor: WatchCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// The watched kind.
    #[must_use]
    pub const fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Current cursor.
    #[must_use]
    pub const fn cursor(&self) -> Option<&WatchCursor> {
        self.cursor.as_ref()
    }

    /// Events delivered to the handler so far.
    #[must_use]
    pub const fn events_seen(&self) -> u64 {
        self.events_seen
    }

    /// Runs until cancelled (`Ok`) or until an error other than a stale
    /// cursor occurs.
    ///
    /// Calling `run` again after an error resumes from the kept cursor.
    pub async fn run<H: WatchHandler + ?Sized>(&mut self, handler: &H) -> Result<(), WatchError> {
        self.state = if self.cursor.is_some() {
            SessionState::Watching
        } else {
            SessionState::Listing
        };

        loop {
            if self.token.is_cancelled() {
                info!(kind = %self.kind, reason = ?self.token.reason(), "Watch stopped");
                return Ok(());
            }

            let step = match self.state {
                SessionState::Listing => self.list(handler).await,
                _ => self.watch(handler).await,
            };
            if let Err(error) = step {
                self.state = SessionState::Failed;
                return Err(error);
            }
        }
    }

    async fn list<H: WatchHandler + ?Sized>(&mut self, handler: &H) -> Result<(), WatchError> {
        let listed = self.api.list(&self.kind).await?;
        info!(
            kind = %self.kind,
            resource_version = %listed.resource_version,
            items = listed.items.len(),
            "Listed"
        );
        handler
            .on_listed(&listed.items)
            .await
            .map_err(|e| self.handler_error(e))?;

        self.cursor = Some(listed.resource_version);
        self.state = SessionState::Watching;
        Ok(())
    }

    async fn watch<H: WatchHandler + ?Sized>(&mut self, handler: &H) -> Result<(), WatchError> {
        let Some(cursor) = self.cursor.clone() else {
            self.state = SessionState::Listing;
            return Ok(());
        };

        debug!(kind = %self.kind, resource_version = %cursor, "Watching");
        let mut stream = match self.api.watch(&self.kind, &cursor, self.timeout).await? {
            WatchOpen::Opened(stream) => stream,
            WatchOpen::Stale => {
                self.relist();
                return Ok(());
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                StreamItem::Event(event) => self.dispatch(handler, &event).await?,
                StreamItem::Stale => {
                    self.relist();
                    return Ok(());
                }
                StreamItem::Failed(error) => return Err(error),
            }
        }
        debug!(kind = %self.kind, "Watch stream ended");
        Ok(())
    }

    async fn dispatch<H: WatchHandler + ?Sized>(
        &mut self,
        handler: &H,
        event: &WatchEvent,
    ) -> Result<(), WatchError> {
        if event.event_type != WatchEventType::Bookmark {
            info!(
                kind = %self.kind,
                event_type = %event.event_type,
                name = event.name().unwrap_or_default(),
                "Event"
            );
            match handler.on_event(event).await {
                Ok(()) => {}
                Err(PipesyncError::Manifest(message)) => {
                    warn!(kind = %self.kind, name = event.name().unwrap_or_default(), %message, "Skipping event");
                }
                Err(other) => return Err(self.handler_error(other)),
            }
            self.events_seen += 1;
        }
        if let Some(cursor) = event.resource_version() {
            self.cursor = Some(cursor);
        }
        Ok(())
    }

    fn relist(&mut self) {
        warn!(
            kind = %self.kind,
            resource_version = ?self.cursor.as_ref().map(WatchCursor::as_str),
            "Cursor expired, relisting"
        );
        self.cursor = None;
        self.state = SessionState::Listing;
    }

    fn handler_error(&self, error: PipesyncError) -> WatchError {
        match error {
            PipesyncError::Watch(inner) => inner,
            other => WatchError::transient(self.kind.to_string(), other.to_string()),
        }
    }
}
