//! Bounded-concurrency executor for bulk remote writes.
use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of a bulk run, both lists in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn summary(&self, verb: &str) -> String {
        if self.failed.is_empty() {
            format!("{} {} item(s)", verb, self.succeeded.len())
        } else {
            format!(
                "{} {} item(s), {} failed",
                verb,
                self.succeeded.len(),
                self.failed.len()
            )
        }
    }
}

/// Run `op` for every `(id, input)` with at most `limit` in flight.
///
/// No retries: each failure is recorded against its id and the run goes on.
pub async fn run_bounded<T, F, Fut>(items: Vec<(String, T)>, limit: usize, op: F) -> BatchReport
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let limit = limit.max(1);
    let mut results: Vec<(usize, String, anyhow::Result<()>)> = stream::iter(
        items.into_iter().enumerate().map(|(idx, (id, input))| {
            let fut = op(input);
            async move { (idx, id, fut.await) }
        }),
    )
    .buffer_unordered(limit)
    .collect()
    .await;
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut report = BatchReport::default();
    for (_, id, res) in results {
        match res {
            Ok(()) => report.succeeded.push(id),
            Err(e) => {
                warn!(id = %id, error = %format!("{e:#}"), "bulk item failed");
                report.failed.push(ItemFailure {
                    id,
                    error: format!("{e:#}"),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn keeps_input_order_and_records_failures() {
        let items = vec![
            ("a".to_string(), 30u64),
            ("b".to_string(), 0),
            ("c".to_string(), 10),
        ];
        let report = run_bounded(items, 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if delay == 0 {
                anyhow::bail!("boom");
            }
            Ok(())
        })
        .await;
        assert_eq!(report.succeeded, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed_ids(), vec!["b"]);
        assert_eq!(report.failed[0].error, "boom");
        assert_eq!(report.summary("Updated"), "Updated 2 item(s), 1 failed");
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items = (0..12).map(|i| (i.to_string(), ())).collect();
        let report = run_bounded(items, 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert!(report.is_clean());
        assert_eq!(report.succeeded.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn zero_limit_still_runs() {
        let report = run_bounded(vec![("x".to_string(), ())], 0, |_| async { Ok(()) }).await;
        assert_eq!(report.succeeded, vec!["x".to_string()]);
    }
}
