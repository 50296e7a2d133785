//! Status polling and failure trapping.
//!
//! [`status_stream`] turns the one-shot status query of
//! [`TransformAdaptor`] into a lazy stream of [`StatusSnapshot`]s, polling
//! until the service reports zero files remaining. [`trap_failures`] wraps
//! any snapshot stream and raises as soon as the service reports a failed
//! file, without emitting the offending snapshot.

use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;

use crate::adaptor::TransformAdaptor;
use crate::error::{Error, Result};
use crate::types::{RequestId, StatusSnapshot};

/// Internal poller state for [`status_stream`]
enum PollState {
    /// Query immediately (first snapshot)
    Poll,
    /// Sleep for the poll interval, then query
    Wait,
    /// Terminal snapshot already emitted
    Done,
}

/// Produce a lazy stream of status snapshots for one request
///
/// Each element is obtained by one status query. Between snapshots the
/// poller sleeps for `poll_interval`; no sleep happens before the first
/// query or after the terminal one. The stream ends after emitting the
/// snapshot with `files_remaining == 0`.
///
/// Status-query errors terminate the stream with that error; they are not
/// retried.
pub fn status_stream(
    adaptor: TransformAdaptor,
    request_id: RequestId,
    poll_interval: Duration,
) -> impl Stream<Item = Result<StatusSnapshot>> {
    stream::try_unfold(PollState::Poll, move |state| {
        let adaptor = adaptor.clone();
        let request_id = request_id.clone();
        async move {
            if matches!(state, PollState::Done) {
                return Ok(None);
            }
            if matches!(state, PollState::Wait) {
                tokio::time::sleep(poll_interval).await;
            }

            let snapshot = adaptor.get_transform_status(&request_id).await?;
            let next = if snapshot.is_terminal() {
                PollState::Done
            } else {
                PollState::Wait
            };
            Ok(Some((snapshot, next)))
        }
    })
}

/// Pass snapshots through unchanged until the service reports a failure
///
/// The sole failure signal from status data is `files_failed > 0`; the
/// first such snapshot is swallowed and [`Error::FilesFailed`] is raised in
/// its place. A `files_remaining` that increases between snapshots is
/// tolerated (the service reports approximate counts).
pub fn trap_failures<S>(statuses: S) -> impl Stream<Item = Result<StatusSnapshot>>
where
    S: Stream<Item = Result<StatusSnapshot>>,
{
    statuses.map(|item| {
        let snapshot = item?;
        if snapshot.files_failed > 0 {
            tracing::error!(
                failed = snapshot.files_failed,
                processed = snapshot.files_processed,
                "Transform service reported failed files"
            );
            return Err(Error::FilesFailed {
                failed: snapshot.files_failed,
                processed: snapshot.files_processed,
            });
        }
        Ok(snapshot)
    })
}
