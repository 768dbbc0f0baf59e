//! Input specs for an invocation run (argument sets, task specs, retry budget).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One `{"Func": ..., "Args": [...]}` entry of the `--args` JSON.
///
/// Args are argument templates: they may still contain `$rand(n)` / `$pad(n, s)`
/// expressions that are expanded when the task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSet {
    #[serde(rename = "Func")]
    pub func: String,

    #[serde(rename = "Args", default)]
    pub args: Vec<String>,
}

impl ArgSet {
    pub fn new(func: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            func: func.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the `--args` JSON: either a single object or an array of objects.
    pub fn parse_list(json: &str) -> Result<Vec<ArgSet>, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(ArgSet),
            Many(Vec<ArgSet>),
        }

        Ok(match serde_json::from_str::<OneOrMany>(json)? {
            OneOrMany::One(set) => vec![set],
            OneOrMany::Many(sets) => sets,
        })
    }
}

/// Whether a task commits its transaction or only collects endorsements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeMode {
    #[default]
    Invoke,
    Query,
}

/// Retry budget of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Maximum submissions including the first one.
    pub max_attempts: u32,

    /// Constant delay before every resubmission.
    pub resubmit_delay: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, resubmit_delay: Duration) -> Self {
        Self {
            max_attempts,
            resubmit_delay,
        }
    }

    /// One attempt, no resubmission.
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Everything a task needs to know about what to invoke.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub chaincode_id: String,
    pub arg_set: ArgSet,

    /// Explicit target peer URLs. Empty means the client selects endorsers.
    pub targets: Vec<String>,

    pub retry: RetryBudget,

    /// Per-call deadline handed to the platform client.
    pub timeout: Duration,

    pub verbose: bool,
    pub payload_only: bool,
    pub mode: InvokeMode,
}

impl TaskSpec {
    pub fn new(chaincode_id: impl Into<String>, arg_set: ArgSet) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            arg_set,
            targets: Vec::new(),
            retry: RetryBudget::single(),
            timeout: Duration::from_secs(5),
            verbose: false,
            payload_only: false,
            mode: InvokeMode::Invoke,
        }
    }

    pub fn with_retry(mut self, retry: RetryBudget) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_mode(mut self, mode: InvokeMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_arg_set() {
        let sets = ArgSet::parse_list(r#"{"Func":"put","Args":["k","v"]}"#).unwrap();
        assert_eq!(sets, vec![ArgSet::new("put", ["k", "v"])]);
    }

    #[test]
    fn parse_batch_keeps_order() {
        let json = r#"[{"Func":"put","Args":["a","1"]},{"Func":"put","Args":["b","2"]}]"#;
        let sets = ArgSet::parse_list(json).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].args, vec!["a", "1"]);
        assert_eq!(sets[1].args, vec!["b", "2"]);
    }

    #[test]
    fn missing_args_default_to_empty() {
        let sets = ArgSet::parse_list(r#"{"Func":"list"}"#).unwrap();
        assert!(sets[0].args.is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(ArgSet::parse_list(r#"{"Args":["k"]}"#).is_err());
        assert!(ArgSet::parse_list("put k v").is_err());
    }

    #[test]
    fn default_task_spec_does_not_retry() {
        let spec = TaskSpec::new("mycc", ArgSet::new("get", ["k"]));
        assert_eq!(spec.retry.max_attempts, 1);
        assert!(spec.targets.is_empty());
        assert_eq!(spec.mode, InvokeMode::Invoke);
    }
}
