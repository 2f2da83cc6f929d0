//! Converging a single run without a watch.

use std::sync::Arc;
use tracing::warn;

use crate::core::PipelineRun;
use crate::errors::{PipesyncError, StoreError};
use crate::reconcile::{RunStatusApi, StatusReconciler};
use crate::retry::{with_retry, RetryConfig};
use crate::store::Store;

/// Returns true for errors a later attempt may not hit.
#[must_use]
pub fn is_transient(error: &PipesyncError) -> bool {
    match error {
        PipesyncError::Watch(e) => e.is_retryable(),
        PipesyncError::Store(StoreError::Backend(_)) => true,
        _ => false,
    }
}

/// Polls one run and writes its status, retrying transient failures.
pub async fn sync_run<S, A>(
    store: Arc<S>,
    api: &A,
    run_id: &str,
    retry: &RetryConfig,
) -> Result<PipelineRun, PipesyncError>
where
    S: Store,
    A: RunStatusApi + ?Sized,
{
    let reconciler = StatusReconciler::new(store);
    with_retry(retry, is_transient, || reconciler.reconcile_run(api, run_id))
        .await
        .inspect_err(|e| warn!(run_id, error = %e, "Run sync failed"))
}
