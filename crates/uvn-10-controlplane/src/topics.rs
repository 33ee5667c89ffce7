//! The three wire topics of §4.10, plus the AGENT_REGISTRY_TOPICS /
//! AGENT_CELL_TOPICS permission sets referenced from the key-material
//! peer-credential grants (topic names a peer's governance document
//! authorizes it to publish/subscribe).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_types::ids::CellId;
use shared_types::net::LanDescriptor;

/// Written by the registry: `{uvn_name, registry_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvnSample {
    pub uvn_name: String,
    pub registry_id: String,
}

/// Written by each cell: its identity, applied config generation, and
/// current routing/reachability view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSample {
    pub cell_id: CellId,
    pub uvn_name: String,
    pub registry_id: String,
    pub routed_networks: Vec<LanDescriptor>,
    pub reachable_networks: Vec<LanDescriptor>,
    pub unreachable_networks: Vec<LanDescriptor>,
    pub start_ts: DateTime<Utc>,
}

/// The payload of a configuration-delivery sample: either a plaintext
/// encrypted string (legacy single-field form) or a signed+encrypted
/// package of bytes (the bundle format of §4.11/§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackbonePayload {
    EncryptedConfig(String),
    SignedEncryptedPackage(Vec<u8>),
}

/// Written by the registry to deliver a new configuration to one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackboneSample {
    pub target_cell_id: CellId,
    pub uvn_name: String,
    pub registry_id: String,
    pub payload: BackbonePayload,
}

/// The registry's default publish/subscribe topic grants, used to seed a
/// registry peer's governance permissions document.
pub const AGENT_REGISTRY_TOPICS: &[&str] = &["UVN", "BACKBONE"];

/// A cell agent's default publish/subscribe topic grants: it writes its
/// own `CELL` sample and reads everyone else's, plus the registry's `UVN`
/// and its own `BACKBONE` deliveries.
pub const AGENT_CELL_TOPICS: &[&str] = &["CELL", "UVN", "BACKBONE"];
