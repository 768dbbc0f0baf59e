//! Printer port - where progress, results and summaries go.
//!
//! Implementations must be safe to call from many workers at once; lines from
//! different tasks may interleave but a single call is never split.

use crate::domain::{Summary, TaskId};
use crate::ports::client::Response;

pub trait Printer: Send + Sync {
    /// Free-form line (progress, error lines, banners).
    fn print_line(&self, line: &str);

    /// Proposal responses of one task, or only the payload when `payload_only`.
    fn print_response(&self, task_id: TaskId, response: &Response, payload_only: bool);

    /// Final summary of a run with more than one invocation.
    fn print_summary(&self, summary: &Summary);
}
