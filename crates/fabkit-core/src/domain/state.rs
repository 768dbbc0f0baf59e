//! State - タスクの状態
//!
//! # 状態遷移
//! ```text
//! Pending -> Running -> Succeeded
//!                   \-> Failed
//! Running -> Running   (resubmission after a retryable error)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    /// Created, not yet picked up by a worker.
    #[default]
    Pending,

    /// A worker is executing (or resubmitting) the invocation.
    Running,

    Succeeded,

    Failed,
}

impl TaskOutcome {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskOutcome::Succeeded | TaskOutcome::Failed)
    }

    /// Valid transitions of the task state machine.
    pub fn can_transition_to(self, next: TaskOutcome) -> bool {
        matches!(
            (self, next),
            (TaskOutcome::Pending, TaskOutcome::Running)
                | (TaskOutcome::Running, TaskOutcome::Running)
                | (TaskOutcome::Running, TaskOutcome::Succeeded)
                | (TaskOutcome::Running, TaskOutcome::Failed)
        )
    }
}
