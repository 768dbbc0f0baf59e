//! Domain model (ids, errors, specs, state, decisions, summaries).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod spec;
pub mod state;
pub mod summary;
pub mod validation;

pub use decision::{Decision, RetryPolicy};
pub use errors::{ErrorDetail, ErrorKind, InvocationError};
pub use ids::TaskId;
pub use spec::{ArgSet, InvokeMode, RetryBudget, TaskSpec};
pub use state::TaskOutcome;
pub use summary::{RunReport, Summary, TaskFailure};
pub use validation::TxValidationCode;
