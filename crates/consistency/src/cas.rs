//! Bounded store calls and the compare-and-set retry loop.

use std::future::Future;
use std::time::Duration;

use common::DocumentId;
use document_store::{DocumentStore, DocumentStoreExt, UpdateOutcome};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};

/// Runs `fut` with a deadline. A timeout is reported as retryable and the
/// call is not assumed to have been applied.
pub(crate) async fn bounded<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    ConsistencyError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ConsistencyError::from),
        Err(_) => {
            metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
            tracing::warn!(operation, ?limit, "call timed out");
            Err(ConsistencyError::Timeout { operation })
        }
    }
}

/// What a mutation decided to do with the document it was shown.
pub(crate) enum Step<R> {
    /// Write the mutated value back under compare-and-set.
    Write(R),
    /// Leave the document alone, back off and look again.
    Wait,
}

/// Read-compute-write of one document guarded by its version stamp.
///
/// `mutate` sees a freshly decoded copy on every attempt and may run more
/// than once. Returns the written value and whatever `mutate` returned on
/// the attempt that won.
pub(crate) async fn update_with_retry<S, T, R, F>(
    store: &S,
    config: &EngineConfig,
    collection: &'static str,
    id: DocumentId,
    mut mutate: F,
) -> Result<(T, R)>
where
    S: DocumentStore,
    T: Serialize + DeserializeOwned + Send,
    R: Send,
    F: FnMut(&mut T) -> Result<R> + Send,
{
    update_when_ready(store, config, collection, id, |value: &mut T| {
        mutate(value).map(Step::Write)
    })
    .await
}

/// Like [`update_with_retry`], but `mutate` may answer [`Step::Wait`] when
/// the document is busy. Waiting spends an attempt just like a conflict.
pub(crate) async fn update_when_ready<S, T, R, F>(
    store: &S,
    config: &EngineConfig,
    collection: &'static str,
    id: DocumentId,
    mut mutate: F,
) -> Result<(T, R)>
where
    S: DocumentStore,
    T: Serialize + DeserializeOwned + Send,
    R: Send,
    F: FnMut(&mut T) -> Result<Step<R>> + Send,
{
    let attempts = config.retry.max_attempts();

    for attempt in 0..attempts {
        let current = bounded(config.store_timeout, "get", store.get(collection, id))
            .await?
            .ok_or(ConsistencyError::NotFound { collection, id })?;

        let mut value: T = current.decode()?;
        let output = match mutate(&mut value)? {
            Step::Write(output) => output,
            Step::Wait => {
                metrics::counter!("cas_waits_total", "collection" => collection).increment(1);
                tracing::debug!(%id, collection, attempt, "document busy, waiting");
                if attempt + 1 < attempts {
                    tokio::time::sleep(config.retry.delay_for_attempt(attempt)).await;
                }
                continue;
            }
        };
        let body = serde_json::to_value(&value)?;

        let outcome = bounded(
            config.store_timeout,
            "compare_and_set",
            store.compare_and_set(collection, id, current.version, body),
        )
        .await?;

        match outcome {
            UpdateOutcome::Applied(_) => return Ok((value, output)),
            UpdateOutcome::NotFound => return Err(ConsistencyError::NotFound { collection, id }),
            UpdateOutcome::PredicateFailed(latest) => {
                metrics::counter!("cas_conflicts_total", "collection" => collection).increment(1);
                tracing::debug!(
                    %id,
                    collection,
                    attempt,
                    expected = %current.version,
                    actual = %latest.version,
                    "compare-and-set conflict"
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(config.retry.delay_for_attempt(attempt)).await;
                }
            }
        }
    }

    metrics::counter!("cas_contention_total", "collection" => collection).increment(1);
    tracing::warn!(%id, collection, attempts, "giving up after repeated conflicts");
    Err(ConsistencyError::Contention {
        collection,
        id,
        attempts,
    })
}
