//! Run summary and report.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::errors::InvocationError;
use super::ids::TaskId;
use crate::error::CoordinatorError;

/// Aggregated numbers for one invocation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub invocation_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_attempts: u64,

    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,

    pub rate_per_second: f64,

    /// Final error message of every failed task.
    pub first_error_per_task: BTreeMap<TaskId, String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    /// Summary of a run that created no tasks.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            invocation_count: 0,
            success_count: 0,
            failure_count: 0,
            total_attempts: 0,
            duration: Duration::ZERO,
            rate_per_second: 0.0,
            first_error_per_task: BTreeMap::new(),
            started_at: at,
            finished_at: at,
        }
    }

    /// Invocations per second over the whole run.
    pub fn rate(invocations: usize, duration: Duration) -> f64 {
        let secs = duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        invocations as f64 / secs
    }

    /// Human readable block printed after runs with more than one invocation.
    pub fn render(&self) -> Vec<String> {
        vec![
            "*********************************************************".to_string(),
            format!("Invocations:  {}", self.invocation_count),
            format!("Successes:    {}", self.success_count),
            format!("Failures:     {}", self.failure_count),
            format!("Attempts:     {}", self.total_attempts),
            format!("Duration:     {:?}", self.duration),
            format!("Rate:         {:.2}/s", self.rate_per_second),
            "*********************************************************".to_string(),
        ]
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

/// A task together with the error it is reported with.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub error: InvocationError,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: Summary,

    /// Final errors of failed tasks, ordered by task id.
    pub failures: Vec<TaskFailure>,

    /// Last intermediate error of tasks that failed at least once and then succeeded.
    pub recovered: Vec<TaskFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn final task failures into an error.
    pub fn into_result(self) -> Result<Summary, CoordinatorError> {
        if self.failures.is_empty() {
            return Ok(self.summary);
        }
        Err(CoordinatorError::TaskFailures {
            failed: self.failures.len(),
            total: self.summary.invocation_count,
        })
    }
}
