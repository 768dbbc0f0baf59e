//! Completion collector - owns the run counters
//!
//! Task callbacks never touch shared counters; they send a `Completion` over an
//! unbounded channel to a single collector task. The collector also drives the
//! progress ticker, so every progress line is a consistent snapshot.
//!
//! ```text
//! callback ─┐
//! callback ─┼─> mpsc ──> collector ──(every period)──> printer
//! callback ─┘                │
//!                            └──> Tally (on finish)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

use crate::domain::{InvocationError, TaskFailure, TaskId};
use crate::ports::Printer;

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Shorter periods are raised to this.
pub const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(1);

/// Terminal outcome of one task, as reported by its callback.
#[derive(Debug, Clone)]
pub struct Completion {
    pub task_id: TaskId,
    pub error: Option<InvocationError>,
}

/// Final counters.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    pub successes: usize,

    /// Failed tasks in completion order.
    pub failures: Vec<TaskFailure>,
}

impl Tally {
    pub fn completed(&self) -> usize {
        self.successes + self.failures.len()
    }

    fn record(&mut self, completion: Completion) {
        match completion.error {
            None => self.successes += 1,
            Some(error) => self.failures.push(TaskFailure {
                task_id: completion.task_id,
                error,
            }),
        }
    }
}

/// Handle to a running collector.
pub struct ProgressCollector {
    tx: mpsc::UnboundedSender<Completion>,
    handle: JoinHandle<Tally>,
}

impl ProgressCollector {
    /// Spawn the collector for a run of `total` tasks.
    ///
    /// Progress lines are printed every `period` (at least
    /// `MIN_PROGRESS_INTERVAL`), the first one a full period after spawning.
    pub fn spawn(total: usize, printer: Arc<dyn Printer>, period: Duration) -> Self {
        let period = period.max(MIN_PROGRESS_INTERVAL);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(collect(rx, total, printer, period));
        Self { tx, handle }
    }

    /// Sender for task callbacks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Completion> {
        self.tx.clone()
    }

    /// Wait until `total` completions arrived or every sender is gone.
    pub async fn finish(self) -> Result<Tally, JoinError> {
        drop(self.tx);
        self.handle.await
    }

    /// Stop collecting without waiting for outstanding completions.
    pub fn abort(self) {
        self.handle.abort();
    }
}

async fn collect(
    mut rx: mpsc::UnboundedReceiver<Completion>,
    total: usize,
    printer: Arc<dyn Printer>,
    period: Duration,
) -> Tally {
    let mut tally = Tally::default();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while tally.completed() < total {
        tokio::select! {
            completion = rx.recv() => {
                let Some(completion) = completion else {
                    break;
                };
                trace!(task_id = %completion.task_id, ok = completion.error.is_none(), "completion");
                tally.record(completion);
            }
            _ = ticker.tick() => {
                printer.print_line(&format!("Success: {}/{}", tally.successes, total));
                printer.print_line(&format!("Failures: {}/{}", tally.failures.len(), total));
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Summary;
    use crate::ports::Response;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Printer for Lines {
        fn print_line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }

        fn print_response(&self, _: TaskId, _: &Response, _: bool) {}

        fn print_summary(&self, _: &Summary) {}
    }

    fn ok(id: u64) -> Completion {
        Completion {
            task_id: TaskId::new(id),
            error: None,
        }
    }

    fn failed(id: u64) -> Completion {
        Completion {
            task_id: TaskId::new(id),
            error: Some(InvocationError::persistent("boom")),
        }
    }

    #[tokio::test]
    async fn counts_successes_and_failures() {
        let collector = ProgressCollector::spawn(3, Arc::new(Lines::default()), Duration::from_secs(60));
        let tx = collector.sender();
        tx.send(ok(1)).unwrap();
        tx.send(failed(2)).unwrap();
        tx.send(ok(3)).unwrap();

        let tally = collector.finish().await.unwrap();
        assert_eq!(tally.successes, 2);
        assert_eq!(tally.failures.len(), 1);
        assert_eq!(tally.failures[0].task_id, TaskId::new(2));
    }

    #[tokio::test]
    async fn finishes_when_all_senders_are_dropped() {
        let collector = ProgressCollector::spawn(5, Arc::new(Lines::default()), Duration::from_secs(60));
        let tx = collector.sender();
        tx.send(ok(1)).unwrap();
        drop(tx);

        let tally = collector.finish().await.unwrap();
        assert_eq!(tally.completed(), 1);
    }

    #[tokio::test]
    async fn zero_tasks_finish_immediately() {
        let lines = Arc::new(Lines::default());
        let collector = ProgressCollector::spawn(0, lines.clone(), Duration::from_millis(1));
        let tally = collector.finish().await.unwrap();
        assert_eq!(tally.completed(), 0);
        assert!(lines.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_period_is_clamped() {
        let lines = Arc::new(Lines::default());
        let collector = ProgressCollector::spawn(2, lines.clone(), Duration::ZERO);
        let tx = collector.sender();
        tx.send(ok(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send(ok(2)).unwrap();

        let tally = collector.finish().await.unwrap();
        assert_eq!(tally.successes, 2);
        assert!(!lines.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prints_progress_every_period() {
        let lines = Arc::new(Lines::default());
        let collector = ProgressCollector::spawn(2, lines.clone(), Duration::from_millis(10));
        let tx = collector.sender();
        tx.send(ok(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(failed(2)).unwrap();
        collector.finish().await.unwrap();

        let lines = lines.0.lock().unwrap();
        assert!(lines.len() >= 2, "{lines:?}");
        assert_eq!(lines[0], "Success: 1/2");
        assert_eq!(lines[1], "Failures: 0/2");
    }
}
