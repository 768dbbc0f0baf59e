//! Errors - invocation error taxonomy
//!
//! Every failure an invocation can hit is classified into one of three
//! variants. Retry eligibility is decided by matching on the variant
//! (see `domain::decision::RetryPolicy`).

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shared, thread-safe error cause.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Deterministic failure. Retrying cannot help.
    Persistent,
    /// May succeed on a later attempt.
    Transient,
    /// Proposal accepted but no commit observed within the call deadline.
    TimeoutOnCommit,
}

/// Message, optional transaction id and optional wrapped cause.
#[derive(Clone)]
pub struct ErrorDetail {
    message: String,
    tx_id: Option<String>,
    cause: Option<Cause>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tx_id: None,
            cause: None,
        }
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }
}

impl fmt::Debug for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDetail")
            .field("message", &self.message)
            .field("tx_id", &self.tx_id)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(tx_id) = &self.tx_id {
            write!(f, " (tx {tx_id})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

/// Error produced by a single chaincode invocation.
#[derive(Debug, Clone, Error)]
pub enum InvocationError {
    #[error("persistent error: {0}")]
    Persistent(ErrorDetail),

    #[error("transient error: {0}")]
    Transient(ErrorDetail),

    #[error("timeout waiting for commit: {0}")]
    TimeoutOnCommit(ErrorDetail),
}

impl InvocationError {
    pub fn persistent(message: impl Into<String>) -> Self {
        Self::Persistent(ErrorDetail::new(message))
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(ErrorDetail::new(message))
    }

    pub fn timeout_on_commit(message: impl Into<String>) -> Self {
        Self::TimeoutOnCommit(ErrorDetail::new(message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Persistent(_) => ErrorKind::Persistent,
            Self::Transient(_) => ErrorKind::Transient,
            Self::TimeoutOnCommit(_) => ErrorKind::TimeoutOnCommit,
        }
    }

    pub fn detail(&self) -> &ErrorDetail {
        match self {
            Self::Persistent(d) | Self::Transient(d) | Self::TimeoutOnCommit(d) => d,
        }
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.detail().tx_id()
    }

    /// Only transient errors and commit timeouts may be resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::TimeoutOnCommit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct Reset;

    #[test]
    fn only_transient_and_commit_timeout_are_retryable() {
        assert!(!InvocationError::persistent("bad args").is_retryable());
        assert!(InvocationError::transient("blip").is_retryable());
        assert!(InvocationError::timeout_on_commit("no block").is_retryable());
    }

    #[test]
    fn display_includes_kind_tx_and_cause() {
        let err = InvocationError::Transient(
            ErrorDetail::new("endorser unavailable")
                .with_tx_id("abc")
                .with_cause(Reset),
        );
        assert_eq!(
            err.to_string(),
            "transient error: endorser unavailable (tx abc): connection reset"
        );
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.tx_id(), Some("abc"));
    }

    #[test]
    fn clones_share_the_same_cause() {
        let err = InvocationError::Persistent(ErrorDetail::new("x").with_cause(Reset));
        let copy = err.clone();
        let a = err.detail().cause().unwrap();
        let b = copy.detail().cause().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }
}
