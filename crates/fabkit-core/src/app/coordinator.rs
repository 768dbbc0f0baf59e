//! InvocationCoordinator - one invocation run from config to report
//!
//! # フロー
//! 1. validate the config and resolve target peers
//! 2. build `iterations × arg_sets` tasks with sequential ids
//! 3. start the worker pool and the completion collector
//! 4. submit every task in creation order (blocks while all workers are busy)
//! 5. drain the pool, collect the tally, sum attempts
//! 6. print error lines, recovered transient errors and the summary
//!
//! The coordinator never retries; tasks report only their terminal outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::expander::ArgExpander;
use super::pool::{Job, WorkerPool};
use super::progress::{Completion, DEFAULT_PROGRESS_INTERVAL, ProgressCollector};
use super::task::InvokeTask;
use crate::config::InvokeConfig;
use crate::domain::{RunReport, Summary, TaskFailure, TaskOutcome};
use crate::error::CoordinatorError;
use crate::ports::{ChannelClient, IdGenerator, Printer, RandomSource};

const POOL_NAME: &str = "invoke";

pub struct InvocationCoordinator {
    client: Arc<dyn ChannelClient>,
    printer: Arc<dyn Printer>,
    rng: Arc<dyn RandomSource>,
    ids: Arc<dyn IdGenerator>,
    progress_interval: Duration,
}

impl InvocationCoordinator {
    pub fn new(
        client: Arc<dyn ChannelClient>,
        printer: Arc<dyn Printer>,
        rng: Arc<dyn RandomSource>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            client,
            printer,
            rng,
            ids,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Build the tasks of a run, in `(iteration, arg set)` order.
    pub fn build_tasks(
        &self,
        config: &InvokeConfig,
        targets: &[String],
    ) -> Vec<Arc<InvokeTask>> {
        let expander = ArgExpander::new(Arc::clone(&self.rng));
        let mut tasks = Vec::with_capacity(config.task_count());
        for _ in 0..config.iterations {
            for arg_set in &config.arg_sets {
                tasks.push(Arc::new(InvokeTask::new(
                    self.ids.next_task_id(),
                    config.task_spec(arg_set, targets),
                    Arc::clone(&self.client),
                    expander.clone(),
                    Arc::clone(&self.printer),
                )));
            }
        }
        tasks
    }

    /// Execute one run.
    ///
    /// Task failures do not make this return `Err`; they are listed in the
    /// report (see `RunReport::into_result`). Errors are configuration and
    /// submission failures only.
    pub async fn run(&self, config: &InvokeConfig) -> Result<RunReport, CoordinatorError> {
        config.validate()?;
        let targets = config.resolve_targets(&self.client.peers())?;
        let tasks = self.build_tasks(config, &targets);
        let total = tasks.len();

        let started_at = Utc::now();
        if tasks.is_empty() {
            debug!(chaincode_id = %config.chaincode_id, "nothing to invoke");
            return Ok(RunReport {
                summary: Summary::empty(started_at),
                failures: Vec::new(),
                recovered: Vec::new(),
            });
        }

        info!(
            chaincode_id = %config.chaincode_id,
            channel_id = %config.channel_id,
            tasks = total,
            concurrency = config.concurrency,
            mode = ?config.mode,
            "starting invocation run"
        );

        let pool = WorkerPool::start(POOL_NAME, config.concurrency)?;
        let collector =
            ProgressCollector::spawn(total, Arc::clone(&self.printer), self.progress_interval);

        for task in &tasks {
            let tx = collector.sender();
            task.set_callback(Box::new(move |task_id, error| {
                // The collector may be gone after an aborted run.
                let _ = tx.send(Completion {
                    task_id,
                    error: error.cloned(),
                });
            }));
        }

        let clock = Instant::now();
        if let Err(e) = self.dispatch(&pool, &tasks).await {
            collector.abort();
            return Err(e);
        }

        pool.stop(true).await;
        let tally = collector.finish().await?;
        let duration = clock.elapsed();
        let finished_at = Utc::now();

        let total_attempts: u64 = tasks.iter().map(|t| u64::from(t.attempts())).sum();

        let mut failures = tally.failures;
        failures.sort_by_key(|f| f.task_id);

        let recovered: Vec<TaskFailure> = tasks
            .iter()
            .filter(|t| t.outcome() == TaskOutcome::Succeeded)
            .filter_map(|t| {
                t.last_error().map(|error| TaskFailure {
                    task_id: t.id(),
                    error,
                })
            })
            .collect();

        let summary = Summary {
            invocation_count: total,
            success_count: tally.successes,
            failure_count: failures.len(),
            total_attempts,
            duration,
            rate_per_second: Summary::rate(total, duration),
            first_error_per_task: failures
                .iter()
                .map(|f| (f.task_id, f.error.to_string()))
                .collect(),
            started_at,
            finished_at,
        };

        self.report(&failures, &recovered, &summary);

        info!(
            successes = summary.success_count,
            failures = summary.failure_count,
            attempts = summary.total_attempts,
            duration_ms = summary.duration.as_millis() as u64,
            "invocation run finished"
        );

        Ok(RunReport {
            summary,
            failures,
            recovered,
        })
    }

    /// Submit `tasks` in order.
    ///
    /// On the first refused submission the pool is drained, so tasks already
    /// handed over still finish, and the run is aborted.
    async fn dispatch(
        &self,
        pool: &WorkerPool,
        tasks: &[Arc<InvokeTask>],
    ) -> Result<(), CoordinatorError> {
        for task in tasks {
            let job: Arc<dyn Job> = Arc::clone(task) as Arc<dyn Job>;
            if let Err(source) = pool.submit(job).await {
                warn!(task_id = %task.id(), error = %source, "submission failed, aborting run");
                pool.stop(true).await;
                return Err(CoordinatorError::Submit {
                    task_id: task.id().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    fn report(&self, failures: &[TaskFailure], recovered: &[TaskFailure], summary: &Summary) {
        for failure in failures {
            self.printer
                .print_line(&format!("Task {} failed: {}", failure.task_id, failure.error));
        }

        if !recovered.is_empty() {
            self.printer
                .print_line(&format!("{} transient errors:", recovered.len()));
            for entry in recovered {
                self.printer
                    .print_line(&format!("Task {}: {}", entry.task_id, entry.error));
            }
        }

        if summary.invocation_count > 1 {
            self.printer.print_summary(summary);
        }
    }
}
