//! Bounded fan-out over asynchronous operations.
//!
//! Caps the number of in-flight futures and yields results in original
//! submission order regardless of completion order. Admission is
//! prompt: as any operation completes, the next queued one starts,
//! even while a slow earlier sibling is still running. One operation
//! failing never cancels its siblings; callers submit fallible
//! operations as futures resolving to `Result` and decide afterward.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio::sync::Semaphore;

/// Run `ops` with at most `cap` in flight at once.
///
/// Each operation waits on a semaphore permit, so a completed sibling
/// frees its slot immediately. Completion order is arbitrary; the
/// returned vector is in submission order. A cap of zero is treated
/// as one.
pub async fn run_bounded<I, F, T>(ops: I, cap: usize) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    let gate = Semaphore::new(cap.max(1));

    let mut in_flight: FuturesUnordered<_> = ops
        .into_iter()
        .enumerate()
        .map(|(index, op)| {
            let gate = &gate;
            async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = gate.acquire().await.ok();
                (index, op.await)
            }
        })
        .collect();

    let mut completed = Vec::with_capacity(in_flight.len());
    while let Some(result) = in_flight.next().await {
        completed.push(result);
    }
    completed.sort_by_key(|(index, _)| *index);
    completed.into_iter().map(|(_, value)| value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_in_submission_order() {
        // Later ops finish first; order must still hold.
        let ops = (0..5u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
            i
        });
        let results = run_bounded(ops, 2).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_never_exceeds_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let ops = (0..5).map(|_| {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });

        run_bounded(ops, 2).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_admits_queued_op_when_any_sibling_completes() {
        // Cap 2 over [slow, quick, queued]: the queued op must start
        // when the quick one finishes (~10 ms), not when the slow head
        // does (~300 ms).
        let t0 = std::time::Instant::now();
        let delays = [300u64, 10, 0];
        let ops = delays.into_iter().map(|d| async move {
            let started_at = t0.elapsed();
            tokio::time::sleep(Duration::from_millis(d)).await;
            started_at
        });

        let results = run_bounded(ops, 2).await;
        assert!(
            results[2] < Duration::from_millis(150),
            "third op admitted only at {:?}",
            results[2]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let completed = Arc::new(AtomicUsize::new(0));
        let ops = (0..4).map(|i| {
            let completed = completed.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    Err("boom")
                } else {
                    Ok(i)
                }
            }
        });

        let results = run_bounded(ops, 2).await;
        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert_eq!(results[0], Ok(0));
        assert_eq!(results[1], Err("boom"));
        assert_eq!(results[3], Ok(3));
    }

    #[tokio::test]
    async fn test_zero_cap_treated_as_one() {
        let results = run_bounded((0..3).map(|i| async move { i }), 0).await;
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<i32> = run_bounded(std::iter::empty::<std::future::Ready<i32>>(), 3).await;
        assert!(results.is_empty());
    }
}
