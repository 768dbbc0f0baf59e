//! ChannelClient port - the platform SDK's channel client
//!
//! The engine never speaks the peer/orderer protocol itself. Everything it
//! needs from the platform goes through this trait:
//! - `execute`: propose → endorse → (handler) → order → wait for commit
//! - `query`: propose → endorse → (handler), no ordering
//! - `peers`: endorsers known to the client, for target selection
//!
//! A call performs exactly one attempt. Resubmission is layered on top by
//! `app::retry::RetryHandle`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{InvocationError, TxValidationCode};

/// A peer that can endorse proposals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    url: String,
    org_id: String,
}

impl Peer {
    pub fn new(url: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            org_id: org_id.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }
}

/// Chaincode call with already expanded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub chaincode_id: String,
    pub function: String,
    pub args: Vec<Vec<u8>>,
}

/// One endorser's answer to a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalResponse {
    /// URL of the endorsing peer.
    pub endorser: String,
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

impl ProposalResponse {
    pub fn ok(endorser: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            endorser: endorser.into(),
            status: 200,
            message: String::new(),
            payload: payload.into(),
        }
    }
}

/// Result of `execute` / `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub tx_id: String,
    pub responses: Vec<ProposalResponse>,

    /// Commit outcome. `None` for queries.
    pub validation_code: Option<TxValidationCode>,
}

impl Response {
    /// Payload of the first endorsement (all endorsements agree after filtering).
    pub fn payload(&self) -> &[u8] {
        self.responses
            .first()
            .map(|r| r.payload.as_slice())
            .unwrap_or_default()
    }
}

/// Inspects endorsements between endorsement and ordering.
///
/// Returning an error stops the transaction from being sent to the orderer.
pub trait EndorsementHandler: Send + Sync {
    fn handle(
        &self,
        tx_id: &str,
        responses: Vec<ProposalResponse>,
    ) -> Result<Vec<ProposalResponse>, InvocationError>;
}

/// Per-call options.
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Target endorsers. Empty lets the client choose.
    pub targets: Vec<String>,

    /// Deadline for the whole call, including waiting for the commit event.
    pub timeout: Duration,

    pub handler: Option<Arc<dyn EndorsementHandler>>,
}

impl ExecuteOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            targets: Vec::new(),
            timeout,
            handler: None,
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn EndorsementHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("targets", &self.targets)
            .field("timeout", &self.timeout)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Errors surfaced by a platform client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Connection problems, unreachable peers, broken streams.
    #[error("transport error: {0}")]
    Transport(String),

    /// Proposal could not be created, sent or endorsed.
    #[error("proposal error: {0}")]
    Proposal(String),

    /// Transaction was ordered but no commit event arrived in time.
    #[error("timed out waiting for commit of tx {tx_id}")]
    CommitTimeout { tx_id: String },

    /// The endorsement handler rejected the responses.
    #[error(transparent)]
    Endorsement(InvocationError),
}

/// Channel client port.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Submit one transaction and wait for its commit.
    async fn execute(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<Response, ClientError>;

    /// Evaluate a transaction on endorsers without ordering it.
    async fn query(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<Response, ClientError>;

    /// Endorsing peers known to this client.
    fn peers(&self) -> Vec<Peer>;
}
