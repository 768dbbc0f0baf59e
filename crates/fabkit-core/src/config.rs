//! InvokeConfig - what one invocation run needs to know.
//!
//! The CLI builds this from flags and the optional network file; the core
//! only validates it and resolves target peers.

use std::time::Duration;

use crate::domain::{ArgSet, InvokeMode, RetryBudget, TaskSpec};
use crate::error::ConfigError;
use crate::ports::Peer;

#[derive(Debug, Clone)]
pub struct InvokeConfig {
    pub chaincode_id: String,
    pub channel_id: String,
    pub arg_sets: Vec<ArgSet>,
    pub iterations: usize,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub resubmit_delay: Duration,
    pub timeout: Duration,

    /// Explicit target peer URLs.
    pub peer_urls: Vec<String>,

    /// Target every peer of these orgs (only used when `peer_urls` is empty).
    pub org_ids: Vec<String>,

    pub verbose: bool,
    pub payload_only: bool,
    pub mode: InvokeMode,
}

impl InvokeConfig {
    pub fn new(chaincode_id: impl Into<String>, arg_sets: Vec<ArgSet>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            channel_id: String::new(),
            arg_sets,
            iterations: 1,
            concurrency: 1,
            max_attempts: 3,
            resubmit_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(5),
            peer_urls: Vec::new(),
            org_ids: Vec::new(),
            verbose: false,
            payload_only: false,
            mode: InvokeMode::Invoke,
        }
    }

    /// Build a config from the `--args` JSON (single object or batch).
    pub fn from_args_json(chaincode_id: impl Into<String>, json: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(chaincode_id, ArgSet::parse_list(json)?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chaincode_id.trim().is_empty() {
            return Err(ConfigError::MissingChaincodeId);
        }
        if self.arg_sets.is_empty() {
            return Err(ConfigError::NoArgSets);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }
        Ok(())
    }

    /// Number of tasks the run creates.
    pub fn task_count(&self) -> usize {
        self.iterations * self.arg_sets.len()
    }

    /// A single invocation always prints its responses.
    pub fn is_verbose(&self) -> bool {
        self.verbose || self.iterations == 1
    }

    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts, self.resubmit_delay)
    }

    /// Resolve the endorsers every task targets.
    ///
    /// - explicit URLs must all be known peers
    /// - otherwise org ids select every peer of those orgs
    /// - otherwise the client picks (empty list)
    pub fn resolve_targets(&self, peers: &[Peer]) -> Result<Vec<String>, ConfigError> {
        if !self.peer_urls.is_empty() {
            for url in &self.peer_urls {
                if !peers.iter().any(|p| p.url() == url) {
                    return Err(ConfigError::UnknownPeer(url.clone()));
                }
            }
            return Ok(self.peer_urls.clone());
        }

        if !self.org_ids.is_empty() {
            let targets: Vec<String> = peers
                .iter()
                .filter(|p| self.org_ids.iter().any(|org| org == p.org_id()))
                .map(|p| p.url().to_string())
                .collect();
            if targets.is_empty() {
                return Err(ConfigError::NoPeersForOrgs(self.org_ids.clone()));
            }
            return Ok(targets);
        }

        Ok(Vec::new())
    }

    /// Per-task spec for `arg_set`.
    pub fn task_spec(&self, arg_set: &ArgSet, targets: &[String]) -> TaskSpec {
        let mut spec = TaskSpec::new(self.chaincode_id.clone(), arg_set.clone())
            .with_retry(self.retry_budget())
            .with_targets(targets.to_vec())
            .with_mode(self.mode);
        spec.timeout = self.timeout;
        spec.verbose = self.is_verbose();
        spec.payload_only = self.payload_only;
        spec
    }
}
