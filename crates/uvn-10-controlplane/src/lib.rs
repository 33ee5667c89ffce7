//! # ControlPlane
//!
//! The UVN/CELL/BACKBONE pub/sub contract (§4.10): topic types, a
//! transport-agnostic `{participant, writer, reader, waitset, condition}`
//! capability interface, a default in-memory transport, and the fixed
//! UVN → CELL → BACKBONE → user-conditions wakeup dispatch order.

pub mod dispatch;
pub mod errors;
pub mod inmem;
pub mod topics;
pub mod transport;

pub use dispatch::{process_wakeup, ControlPlaneHandlers};
pub use errors::ControlPlaneError;
pub use inmem::InMemoryControlPlane;
pub use topics::{BackbonePayload, BackboneSample, CellSample, UvnSample, AGENT_CELL_TOPICS, AGENT_REGISTRY_TOPICS};
pub use transport::{ControlPlaneTransport, TopicEvent, UserCondition};
