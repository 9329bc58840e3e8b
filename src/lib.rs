//! # agent-mesh - Brokerless Agent Coordination
//!
//! A coordination core for autonomous, economically-constrained agents:
//! advertise capabilities, find peers, trade services, exchange messages and
//! share knowledge without a central broker process. All coordination
//! happens through a shared, concurrently-accessed record store that any
//! agent process can read and write.
//!
//! ## Architecture
//!
//! - **Manifest Registry**: persistence and discovery of agent manifests
//!   (identity + capabilities + liveness) keyed by `agent_id`
//! - **Task Matcher**: ranks every advertised capability against a free-text
//!   task description with a deterministic lexical scorer
//! - **Marketplace**: priced service listings and buyer orders tracked
//!   through a small seller-driven state machine
//! - **Messaging**: per-recipient inboxes with at-least-once delivery
//! - **Knowledge Base**: append-only store of tagged, confidence-scored facts
//! - **AgentNetwork**: the facade composing the above; the only thing
//!   external collaborators call
//!
//! The storage medium is pluggable (`SharedStore`); the reference
//! implementation is a shared filesystem directory with one JSON file per
//! entity and atomic per-record replace. Transport, authentication and
//! payment settlement live outside this crate.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod marketplace;
pub mod matcher;
pub mod messaging;
pub mod model;
pub mod network;
pub mod registry;
pub mod storage;

pub use config::{init_tracing, LoggingConfig, MeshConfig, NetworkConfig, StorageConfig};
pub use error::{MeshError, Result};
pub use knowledge::KnowledgeBase;
pub use marketplace::Marketplace;
pub use matcher::{TaskMatch, TaskMatcher};
pub use messaging::Messaging;
pub use model::{
    AgentIdentity, AgentManifest, Capability, CapabilityGroup, KnowledgeEntry, Message, Order,
    OrderStatus, Payload, ServiceListing,
};
pub use network::{AgentNetwork, NetworkStats};
pub use registry::ManifestRegistry;
pub use storage::{FsStore, MemoryStore, SharedStore};

/// Globally unique, externally assigned agent identifier.
pub type AgentId = String;
