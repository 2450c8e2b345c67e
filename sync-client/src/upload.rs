//! Chunked upload with per-chunk retry.
//!
//! Ranges go out strictly in ascending order. Each one is retried
//! independently with exponential backoff; a non-retryable error (auth,
//! 416) aborts the whole upload at once.

use std::future::Future;

use async_trait::async_trait;
use snapsync_core::{ByteRange, ChunkPolicy};
use tracing::{debug, warn};

use crate::store::{StoreError, UploadReport};

/// Destination for one upload request.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Send one piece of the payload.
    ///
    /// `range` is `None` when `body` is the whole payload.
    async fn put_chunk(
        &self,
        index: usize,
        range: Option<ByteRange>,
        body: &[u8],
    ) -> Result<(), StoreError>;
}

/// Upload `payload` in one request when it fits in a chunk, by ascending
/// byte ranges otherwise.
pub async fn upload<S: ChunkSink + ?Sized>(
    sink: &S,
    payload: &[u8],
    policy: &ChunkPolicy,
) -> Result<UploadReport, StoreError> {
    policy.validate_payload(payload.len())?;

    if !policy.needs_chunking(payload.len()) {
        let attempts = with_retry(policy, 0, || sink.put_chunk(0, None, payload)).await?;
        return Ok(UploadReport {
            chunks: 1,
            attempts,
            bytes: payload.len(),
        });
    }

    let ranges = policy.plan(payload.len())?;
    upload_ranges(sink, payload, &ranges, policy).await
}

/// Upload every range of a plan, in order.
pub async fn upload_ranges<S: ChunkSink + ?Sized>(
    sink: &S,
    payload: &[u8],
    ranges: &[ByteRange],
    policy: &ChunkPolicy,
) -> Result<UploadReport, StoreError> {
    let mut report = UploadReport {
        bytes: payload.len(),
        ..UploadReport::default()
    };

    for (index, range) in ranges.iter().enumerate() {
        let body = &payload[range.as_slice_range()];
        debug!(index, range = %range, "uploading chunk");
        report.attempts +=
            with_retry(policy, index, || sink.put_chunk(index, Some(*range), body)).await?;
        report.chunks += 1;
    }

    Ok(report)
}

/// Run `op` until it succeeds, fails non-retryably, or exhausts the budget.
///
/// Returns the number of attempts made.
pub async fn with_retry<F, Fut>(
    policy: &ChunkPolicy,
    index: usize,
    mut op: F,
) -> Result<u32, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let max_attempts = policy.attempts_per_chunk();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(()) => return Ok(attempt),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                return Err(StoreError::ChunkFailed {
                    index,
                    attempts: attempt,
                    source: Box::new(err),
                })
            }
            Err(err) => {
                let delay = policy.retry_delay(attempt);
                warn!(
                    index,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "chunk upload failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
