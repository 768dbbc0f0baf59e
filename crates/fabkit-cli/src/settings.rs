//! Network file (YAML).
//!
//! ```yaml
//! channel: mychannel
//! peers:
//!   - url: grpcs://peer0.org1.example.com:7051
//!     org_id: Org1MSP
//! simulation:
//!   endorse_latency_ms: 5
//!   commit_latency_ms: 20
//! output:
//!   target: stderr
//!   format: json
//! ```
//!
//! Every section is optional; CLI flags override what the file says.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use fabkit_core::impls::{OutputTarget, PrintFormat, SimulatedChannel};
use fabkit_core::ports::Peer;
use serde::Deserialize;

pub const DEFAULT_CHANNEL: &str = "mychannel";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub channel: String,
    pub peers: Vec<PeerSettings>,
    pub simulation: SimulationSettings,
    pub output: OutputSettings,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            peers: Vec::new(),
            simulation: SimulationSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerSettings {
    pub url: String,
    pub org_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub endorse_latency_ms: u64,
    pub commit_latency_ms: u64,

    /// Peers that return corrupted payloads.
    pub divergent_peers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub target: OutputTarget,
    pub format: PrintFormat,
}

impl NetworkSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read network file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid network file {}", path.display()))
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Simulated channel for this network; two orgs with one peer each when
    /// the file lists no peers.
    pub fn channel(&self, channel_id: &str) -> SimulatedChannel {
        let channel = if self.peers.is_empty() {
            SimulatedChannel::two_org_default(channel_id)
        } else {
            SimulatedChannel::new(
                channel_id,
                self.peers
                    .iter()
                    .map(|p| Peer::new(p.url.clone(), p.org_id.clone()))
                    .collect(),
            )
        };

        let sim = &self.simulation;
        sim.divergent_peers.iter().fold(
            channel
                .with_endorse_latency(Duration::from_millis(sim.endorse_latency_ms))
                .with_commit_latency(Duration::from_millis(sim.commit_latency_ms)),
            |channel, url| channel.with_divergent_peer(url.clone()),
        )
    }
}
