//! One supervised watch loop.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cancellation::CancellationToken;
use crate::errors::WatchError;
use crate::observability::AlertReason;
use crate::retry::{should_retry, RetryConfig, RetryDecision, RetryState};
use crate::watch::{ResourceKind, WatchApi, WatchHandler, WatchSession};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A watched kind with its handler, timeout and retry budget.
pub struct WatchLoop {
    api: Arc<dyn WatchApi>,
    kind: ResourceKind,
    timeout: Duration,
    retry: RetryConfig,
    handler: Arc<dyn WatchHandler>,
}

/// Why a supervised loop gave up.
#[derive(Debug)]
pub(crate) struct LoopFailure {
    pub reason: AlertReason,
    pub error: WatchError,
    pub attempts: usize,
}

impl WatchLoop {
    /// Creates a loop with a 30 s watch timeout and the default budget.
    #[must_use]
    pub fn new(api: Arc<dyn WatchApi>, kind: ResourceKind, handler: Arc<dyn WatchHandler>) -> Self {
        Self {
            api,
            kind,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            handler,
        }
    }

    /// Sets the server-side watch timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The watched kind.
    #[must_use]
    pub const fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Runs the session until the token is cancelled, restarting it after
    /// transient errors.
    ///
    /// The budget counts consecutive failures; a run that delivered events
    /// before failing starts the count over.
    pub(crate) async fn supervise(self, token: CancellationToken) -> Result<(), LoopFailure> {
        let mut session = WatchSession::new(self.api.clone(), self.kind.clone(), self.timeout, token.clone());
        let mut state = RetryState::new();
        let mut seen = 0;

        loop {
            let Err(error) = session.run(self.handler.as_ref()).await else {
                return Ok(());
            };

            if session.events_seen() > seen {
                seen = session.events_seen();
                state.reset();
            }

            match should_retry(&mut state, &self.retry, error.is_retryable()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        kind = %self.kind,
                        attempt = state.attempt(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Watch failed, restarting"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = token.cancelled() => {
                            info!(kind = %self.kind, "Cancelled during backoff");
                            return Ok(());
                        }
                    }
                }
                RetryDecision::GiveUp => {
                    return Err(LoopFailure {
                        reason: AlertReason::RetriesExhausted,
                        error,
                        attempts: state.attempt(),
                    });
                }
                RetryDecision::NotRetryable => {
                    return Err(LoopFailure {
                        reason: AlertReason::Fatal,
                        error,
                        attempts: state.attempt(),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for WatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
