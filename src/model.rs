use crate::{AgentId, MeshError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Opaque key/value payload carried on orders and messages. The core never
/// inspects its contents; validation belongs to the fulfillment side.
pub type Payload = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub agent_id: AgentId,
    pub name: String,
    pub ticker: String,
    pub agent_type: String,
    pub specialty: String,
}

impl AgentIdentity {
    pub fn new(
        agent_id: impl Into<AgentId>,
        name: impl Into<String>,
        ticker: impl Into<String>,
        agent_type: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            ticker: ticker.into(),
            agent_type: agent_type.into(),
            specialty: specialty.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityGroup {
    pub skill_id: String,
    pub name: String,
    pub description: String,
    pub actions: Vec<Capability>,
}

impl CapabilityGroup {
    pub fn new(
        skill_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        actions: Vec<Capability>,
    ) -> Self {
        Self {
            skill_id: skill_id.into(),
            name: name.into(),
            description: description.into(),
            actions,
        }
    }
}

/// An agent's published description: identity plus everything it can do.
/// The latest registration for an `agent_id` replaces the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentManifest {
    pub identity: AgentIdentity,
    pub capabilities: Vec<CapabilityGroup>,
    pub total_actions: usize,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub manifest_hash: String,
}

impl AgentManifest {
    pub fn new(identity: AgentIdentity, capabilities: Vec<CapabilityGroup>) -> Self {
        let mut manifest = Self {
            identity,
            capabilities,
            total_actions: 0,
            last_seen: Utc::now(),
            manifest_hash: String::new(),
        };
        manifest.refresh_derived();
        manifest
    }

    /// Recompute the derived fields from the current capability set.
    pub fn refresh_derived(&mut self) {
        self.total_actions = self
            .capabilities
            .iter()
            .map(|group| group.actions.len())
            .sum();
        self.manifest_hash = self.compute_hash();
    }

    pub fn total_skills(&self) -> usize {
        self.capabilities.len()
    }

    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .capabilities
            .iter()
            .flat_map(|group| group.actions.iter())
            .flat_map(|action| action.tags.iter())
            .map(|tag| tag.to_lowercase())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tags.sort();
        tags
    }

    pub fn is_active(&self, liveness_window: Duration) -> bool {
        Utc::now() - self.last_seen <= liveness_window
    }

    pub fn validate(&self) -> Result<()> {
        if self.identity.agent_id.is_empty() {
            return Err(MeshError::Validation("agent_id must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for group in &self.capabilities {
            if group.skill_id.is_empty() {
                return Err(MeshError::Validation("skill_id must not be empty".to_string()));
            }
            if !seen.insert(group.skill_id.as_str()) {
                return Err(MeshError::Validation(format!(
                    "Duplicate skill_id '{}' in manifest",
                    group.skill_id
                )));
            }
        }
        Ok(())
    }

    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        if let Ok(identity) = serde_json::to_vec(&self.identity) {
            hasher.update(identity);
        }
        if let Ok(capabilities) = serde_json::to_vec(&self.capabilities) {
            hasher.update(capabilities);
        }
        hex::encode(hasher.finalize())[..16].to_string()
    }
}

/// A priced, publicly discoverable service offer. Immutable once published
/// except for the withdrawal flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListing {
    pub service_id: Uuid,
    pub agent_id: AgentId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub tags: Vec<String>,
    #[serde(default)]
    pub withdrawn: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceListing {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        tags: Vec<String>,
    ) -> Self {
        Self {
            service_id: Uuid::new_v4(),
            agent_id: AgentId::new(),
            name: name.into(),
            description: description.into(),
            price,
            tags,
            withdrawn: false,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MeshError::Validation("Service name must not be empty".to_string()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(MeshError::Validation(format!(
                "Service price must be non-negative, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Fulfilled | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// A buyer's request against a listing, tracked through the fulfillment
/// state machine: pending -> accepted | rejected, accepted -> fulfilled |
/// cancelled. Only pending and accepted orders are cancellable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub buyer_agent_id: AgentId,
    pub params: Payload,
    pub status: OrderStatus,
    #[serde(default)]
    pub result: Option<Payload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(service_id: Uuid, buyer_agent_id: AgentId, params: Payload) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4(),
            service_id,
            buyer_agent_id,
            params,
            status: OrderStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn accept(&mut self) -> Result<()> {
        self.transition_from(OrderStatus::Pending, OrderStatus::Accepted)
    }

    pub fn reject(&mut self) -> Result<()> {
        self.transition_from(OrderStatus::Pending, OrderStatus::Rejected)
    }

    pub fn fulfill(&mut self, result: Option<Payload>) -> Result<()> {
        self.transition_from(OrderStatus::Accepted, OrderStatus::Fulfilled)?;
        self.result = result;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.status != OrderStatus::Pending && self.status != OrderStatus::Accepted {
            return Err(MeshError::InvalidState(format!(
                "Cannot cancel order {} in state {}",
                self.order_id, self.status
            )));
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition_from(&mut self, expected: OrderStatus, next: OrderStatus) -> Result<()> {
        if self.status != expected {
            return Err(MeshError::InvalidState(format!(
                "Cannot move order {} from {} to {}",
                self.order_id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub from_agent: AgentId,
    pub to_agent: AgentId,
    pub subject: String,
    pub body: Payload,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(to_agent: impl Into<AgentId>, subject: impl Into<String>, body: Payload) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            from_agent: AgentId::new(),
            to_agent: to_agent.into(),
            subject: subject.into(),
            body,
            created_at: Utc::now(),
            read: false,
        }
    }
}

/// A shared, confidence-scored fact. Entries are append-only; the core
/// never mutates or purges them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub entry_id: Uuid,
    pub author_agent_id: AgentId,
    pub content: String,
    pub category: String,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        content: impl Into<String>,
        category: impl Into<String>,
        confidence: f64,
        tags: Vec<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            author_agent_id: AgentId::new(),
            content: content.into(),
            category: category.into(),
            confidence,
            tags,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(MeshError::Validation(format!(
                "Confidence must be within [0.0, 1.0], got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}
