//! SimulatedChannel - 開発用の channel client
//!
//! An in-process stand-in for the platform SDK so the CLI runs end to end.
//! It is not a protocol implementation: all peers share one versioned
//! key/value ledger.
//!
//! # 実装詳細
//! - endorsement: the function runs against a snapshot and records the
//!   versions it read; every target peer returns the same result
//! - handler: applied to the endorsements before anything is committed
//! - commit: a read version that changed since endorsement invalidates the
//!   transaction with `MVCC_READ_CONFLICT`; a reused tx id with
//!   `DUPLICATE_TXID`
//! - commit latency above the per-call timeout yields `CommitTimeout`
//! - `del` leaves a tombstone, so a key's version never goes backwards
//!
//! # Chaincode
//! | function | args | payload |
//! |---|---|---|
//! | `put` | key, value | empty |
//! | `get` | key | current value |
//! | `del` | key | empty |
//!
//! Anything else endorses with status 500.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::domain::TxValidationCode;
use crate::ports::{
    ChannelClient, ClientError, ExecuteOptions, Peer, ProposalResponse, Request, Response,
};

const STATUS_OK: i32 = 200;
const STATUS_ERROR: i32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionedValue {
    /// `None` is a tombstone; a deleted key keeps counting versions.
    value: Option<Vec<u8>>,
    version: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    state: HashMap<String, VersionedValue>,
    committed: HashSet<String>,
    height: u64,
}

impl Ledger {
    fn version_of(&self, key: &str) -> u64 {
        self.state.get(key).map_or(0, |v| v.version)
    }
}

/// Result of simulating one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Simulation {
    status: i32,
    message: String,
    payload: Vec<u8>,
    reads: Vec<(String, u64)>,
    writes: Vec<(String, Option<Vec<u8>>)>,
}

impl Simulation {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR,
            message: message.into(),
            payload: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }
}

/// What gets ordered: the tx id with its read/write sets.
#[derive(Debug, Clone)]
struct Envelope {
    tx_id: String,
    reads: Vec<(String, u64)>,
    writes: Vec<(String, Option<Vec<u8>>)>,
}

/// SimulatedChannel は開発用の `ChannelClient`
///
/// # 使用例
/// ```ignore
/// let channel = SimulatedChannel::new("mychannel", peers)
///     .with_commit_latency(Duration::from_millis(20));
/// let response = channel.execute(&request, &options).await?;
/// ```
pub struct SimulatedChannel {
    channel_id: String,
    peers: Vec<Peer>,
    endorse_latency: Duration,
    commit_latency: Duration,
    /// Peers whose endorsement payload is corrupted (fault injection).
    divergent: HashSet<String>,
    ledger: Mutex<Ledger>,
    next_tx: AtomicU64,
}

impl SimulatedChannel {
    pub fn new(channel_id: impl Into<String>, peers: Vec<Peer>) -> Self {
        Self {
            channel_id: channel_id.into(),
            peers,
            endorse_latency: Duration::ZERO,
            commit_latency: Duration::ZERO,
            divergent: HashSet::new(),
            ledger: Mutex::new(Ledger::default()),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Two orgs with one peer each.
    pub fn two_org_default(channel_id: impl Into<String>) -> Self {
        Self::new(
            channel_id,
            vec![
                Peer::new("grpcs://peer0.org1.example.com:7051", "Org1MSP"),
                Peer::new("grpcs://peer0.org2.example.com:9051", "Org2MSP"),
            ],
        )
    }

    pub fn with_endorse_latency(mut self, latency: Duration) -> Self {
        self.endorse_latency = latency;
        self
    }

    pub fn with_commit_latency(mut self, latency: Duration) -> Self {
        self.commit_latency = latency;
        self
    }

    /// Make `url` return a payload that differs from the other endorsers.
    pub fn with_divergent_peer(mut self, url: impl Into<String>) -> Self {
        self.divergent.insert(url.into());
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Committed value of `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.ledger().state.get(key).and_then(|v| v.value.clone())
    }

    /// Number of valid transactions committed so far.
    pub fn height(&self) -> u64 {
        self.ledger().height
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_tx_id(&self) -> String {
        let n = self.next_tx.fetch_add(1, Ordering::Relaxed);
        format!("{}-tx-{n:08}", self.channel_id)
    }

    fn endorsers(&self, targets: &[String]) -> Result<Vec<String>, ClientError> {
        if targets.is_empty() {
            return Ok(self.peers.iter().map(|p| p.url().to_string()).collect());
        }
        for target in targets {
            if !self.peers.iter().any(|p| p.url() == target) {
                return Err(ClientError::Transport(format!("no connection to peer {target}")));
            }
        }
        Ok(targets.to_vec())
    }

    fn simulate(&self, request: &Request) -> Simulation {
        let ledger = self.ledger();
        let arg = |i: usize| request.args.get(i).map(|a| String::from_utf8_lossy(a).into_owned());

        match (request.function.as_str(), request.args.len()) {
            ("put", 2) => {
                let (Some(key), Some(value)) = (arg(0), request.args.get(1)) else {
                    return Simulation::failed("put expects key and value");
                };
                Simulation {
                    status: STATUS_OK,
                    message: String::new(),
                    payload: Vec::new(),
                    reads: vec![(key.clone(), ledger.version_of(&key))],
                    writes: vec![(key, Some(value.clone()))],
                }
            }
            ("get", 1) => {
                let Some(key) = arg(0) else {
                    return Simulation::failed("get expects a key");
                };
                Simulation {
                    status: STATUS_OK,
                    message: String::new(),
                    payload: ledger
                        .state
                        .get(&key)
                        .and_then(|v| v.value.clone())
                        .unwrap_or_default(),
                    reads: vec![(key.clone(), ledger.version_of(&key))],
                    writes: Vec::new(),
                }
            }
            ("del", 1) => {
                let Some(key) = arg(0) else {
                    return Simulation::failed("del expects a key");
                };
                Simulation {
                    status: STATUS_OK,
                    message: String::new(),
                    payload: Vec::new(),
                    reads: vec![(key.clone(), ledger.version_of(&key))],
                    writes: vec![(key, None)],
                }
            }
            ("put" | "get" | "del", n) => {
                Simulation::failed(format!("{}: wrong number of args: {n}", request.function))
            }
            (other, _) => Simulation::failed(format!("unknown function: {other}")),
        }
    }

    async fn endorse(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<(String, Vec<ProposalResponse>, Simulation), ClientError> {
        if request.chaincode_id.is_empty() {
            return Err(ClientError::Proposal("chaincode id is empty".to_string()));
        }
        let endorsers = self.endorsers(&options.targets)?;
        let tx_id = self.next_tx_id();

        if !self.endorse_latency.is_zero() {
            tokio::time::sleep(self.endorse_latency).await;
        }

        let simulation = self.simulate(request);
        let responses: Vec<ProposalResponse> = endorsers
            .into_iter()
            .map(|endorser| {
                let mut payload = simulation.payload.clone();
                if self.divergent.contains(&endorser) {
                    payload.push(b'!');
                }
                ProposalResponse {
                    endorser,
                    status: simulation.status,
                    message: simulation.message.clone(),
                    payload,
                }
            })
            .collect();
        trace!(%tx_id, function = %request.function, status = simulation.status, "endorsed");

        let responses = match &options.handler {
            Some(handler) => handler
                .handle(&tx_id, responses)
                .map_err(ClientError::Endorsement)?,
            None => responses,
        };

        Ok((tx_id, responses, simulation))
    }

    fn commit(&self, envelope: &Envelope) -> TxValidationCode {
        let mut ledger = self.ledger();

        if !ledger.committed.insert(envelope.tx_id.clone()) {
            return TxValidationCode::DuplicateTxid;
        }
        let stale = envelope
            .reads
            .iter()
            .any(|(key, version)| ledger.version_of(key) != *version);
        if stale {
            return TxValidationCode::MvccReadConflict;
        }

        for (key, value) in &envelope.writes {
            let version = ledger.version_of(key) + 1;
            ledger.state.insert(
                key.clone(),
                VersionedValue {
                    value: value.clone(),
                    version,
                },
            );
        }
        ledger.height += 1;
        TxValidationCode::Valid
    }
}

#[async_trait]
impl ChannelClient for SimulatedChannel {
    async fn execute(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<Response, ClientError> {
        let (tx_id, responses, simulation) = self.endorse(request, options).await?;

        if self.commit_latency > options.timeout {
            tokio::time::sleep(options.timeout).await;
            debug!(%tx_id, timeout = ?options.timeout, "commit event not received in time");
            return Err(ClientError::CommitTimeout { tx_id });
        }
        if !self.commit_latency.is_zero() {
            tokio::time::sleep(self.commit_latency).await;
        }

        let code = self.commit(&Envelope {
            tx_id: tx_id.clone(),
            reads: simulation.reads,
            writes: simulation.writes,
        });
        debug!(%tx_id, %code, "committed");

        Ok(Response {
            tx_id,
            responses,
            validation_code: Some(code),
        })
    }

    async fn query(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<Response, ClientError> {
        let (tx_id, responses, _) = self.endorse(request, options).await?;
        Ok(Response {
            tx_id,
            responses,
            validation_code: None,
        })
    }

    fn peers(&self) -> Vec<Peer> {
        self.peers.clone()
    }
}
