use thiserror::Error;

/// Invalid run configuration, detected before any task is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chaincode id must not be empty")]
    MissingChaincodeId,

    #[error("at least one argument set is required")]
    NoArgSets,

    #[error("invalid argument JSON: {0}")]
    InvalidArgs(#[from] serde_json::Error),

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("max attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("no peers found for org ids {0:?}")]
    NoPeersForOrgs(Vec<String>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("worker pool {0} is stopped")]
    Stopped(String),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("submitting task {task_id} failed: {source}")]
    Submit { task_id: String, source: PoolError },

    #[error("progress collector failed: {0}")]
    Collector(#[from] tokio::task::JoinError),

    #[error("{failed} of {total} invocations failed")]
    TaskFailures { failed: usize, total: usize },
}
