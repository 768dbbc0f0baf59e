//! Task identifiers.
//!
//! Task ids are monotonic decimal numbers assigned by an `IdGenerator` when the
//! coordinator builds a run (`1`, `2`, `3`, ...). They only need to be unique
//! within one run, so no ULID / timestamp component is involved.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a Task (one chaincode invocation within a run).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_displays_as_decimal() {
        assert_eq!(TaskId::new(1).to_string(), "1");
        assert_eq!(TaskId::new(42).to_string(), "42");
    }

    #[test]
    fn task_ids_order_by_value() {
        let mut ids = vec![TaskId::new(3), TaskId::new(1), TaskId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![TaskId::new(1), TaskId::new(2), TaskId::new(3)]);
    }

    #[test]
    fn task_id_serializes_as_plain_number() {
        let s = serde_json::to_string(&TaskId::new(7)).unwrap();
        assert_eq!(s, "7");
    }
}
