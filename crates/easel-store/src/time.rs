use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{StoreError, StoreResult};

/// Run a backend call, failing with `DeadlineExceeded` if `limit` elapses
/// first. The call's future is dropped on timeout, which aborts the I/O.
pub(crate) async fn with_deadline<T, F>(limit: Option<Duration>, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::DeadlineExceeded(limit))?,
        None => call.await,
    }
}

/// Timestamp for a save that follows one stamped `previous`.
///
/// Truncated to microseconds, the precision every backend can round-trip, and
/// always strictly after `previous`.
pub(crate) fn next_updated_at(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev => prev + chrono::Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_after_previous() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let next = next_updated_at(Some(future));
        assert!(next > future);
    }

    #[test]
    fn next_without_previous_is_now() {
        let before = Utc::now().trunc_subsecs(6);
        let next = next_updated_at(None);
        assert!(next >= before);
        assert_eq!(next.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[tokio::test]
    async fn deadline_expires() {
        let result: StoreResult<()> = with_deadline(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn no_deadline_passes_through() {
        let result = with_deadline(None, async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
