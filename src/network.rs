//! The single entry point external collaborators talk to.
//!
//! `AgentNetwork` holds the owning identity and the shared-storage handle
//! for its lifetime and composes the registry, matcher, marketplace,
//! messaging and knowledge components. It keeps no authoritative state of
//! its own: every method is one unit of work against the shared medium.

use crate::{
    AgentId, AgentIdentity, AgentManifest, KnowledgeBase, KnowledgeEntry, ManifestRegistry,
    Marketplace, MeshConfig, MeshError, Message, Messaging, Order, Payload, Result,
    ServiceListing, SharedStore, TaskMatch, TaskMatcher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub struct AgentNetwork {
    identity: AgentIdentity,
    registry: ManifestRegistry,
    matcher: TaskMatcher,
    marketplace: Marketplace,
    messaging: Messaging,
    knowledge: KnowledgeBase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    pub agent_id: AgentId,
    pub name: String,
    pub services_published: usize,
    pub orders_placed: usize,
    pub orders_received: usize,
    pub unread_messages: usize,
}

impl AgentNetwork {
    pub fn new(identity: AgentIdentity, store: Arc<dyn SharedStore>, config: &MeshConfig) -> Self {
        let registry = ManifestRegistry::new(store.clone(), config.liveness_window());
        let matcher = TaskMatcher::new(registry.clone(), config.network.min_match_score);
        let messaging = Messaging::new(store.clone(), registry.clone());
        Self {
            identity,
            registry,
            matcher,
            marketplace: Marketplace::new(store.clone()),
            messaging,
            knowledge: KnowledgeBase::new(store),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    // --- Registration & discovery -------------------------------------

    /// Join the network by publishing this agent's manifest. The manifest
    /// must carry our own identity; the latest registration wins.
    pub async fn register(&self, manifest: AgentManifest) -> Result<AgentManifest> {
        if manifest.identity.agent_id != self.identity.agent_id {
            return Err(MeshError::Validation(format!(
                "Manifest identity '{}' does not match network identity '{}'",
                manifest.identity.agent_id, self.identity.agent_id
            )));
        }
        self.registry.register(manifest).await
    }

    /// Shorthand for registering a manifest built from our identity.
    pub async fn register_capabilities(
        &self,
        capabilities: Vec<crate::CapabilityGroup>,
    ) -> Result<AgentManifest> {
        self.register(AgentManifest::new(self.identity.clone(), capabilities))
            .await
    }

    pub async fn heartbeat(&self) -> Result<AgentManifest> {
        self.registry.heartbeat(&self.identity.agent_id).await
    }

    pub async fn discover_agents(
        &self,
        agent_type: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<AgentManifest>> {
        self.registry.list_agents(agent_type, active_only).await
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentManifest> {
        self.registry.get(agent_id).await
    }

    /// Rank every active peer's capabilities against a task description.
    /// Our own manifest is excluded; an agent does not hire itself.
    pub async fn find_agent_for_task(&self, text: &str) -> Result<Vec<TaskMatch>> {
        let mut matches = self.matcher.find_agent_for_task(text).await?;
        matches.retain(|m| m.manifest.identity.agent_id != self.identity.agent_id);
        Ok(matches)
    }

    // --- Marketplace --------------------------------------------------

    pub async fn publish_service(&self, listing: ServiceListing) -> Result<ServiceListing> {
        self.marketplace
            .publish_service(&self.identity.agent_id, listing)
            .await
    }

    pub async fn list_services(
        &self,
        tags: Option<&[String]>,
        max_price: Option<f64>,
    ) -> Result<Vec<ServiceListing>> {
        self.marketplace.list_services(tags, max_price).await
    }

    pub async fn withdraw_service(&self, service_id: Uuid) -> Result<ServiceListing> {
        self.marketplace
            .withdraw_service(&self.identity.agent_id, service_id)
            .await
    }

    pub async fn create_order(&self, service_id: Uuid, params: Payload) -> Result<Order> {
        self.marketplace
            .create_order(&self.identity.agent_id, service_id, params)
            .await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
        self.marketplace.get_order(order_id).await
    }

    pub async fn accept_order(&self, order_id: Uuid) -> Result<Order> {
        self.marketplace
            .accept_order(&self.identity.agent_id, order_id)
            .await
    }

    pub async fn reject_order(&self, order_id: Uuid) -> Result<Order> {
        self.marketplace
            .reject_order(&self.identity.agent_id, order_id)
            .await
    }

    pub async fn fulfill_order(&self, order_id: Uuid, result: Option<Payload>) -> Result<Order> {
        self.marketplace
            .fulfill_order(&self.identity.agent_id, order_id, result)
            .await
    }

    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order> {
        self.marketplace
            .cancel_order(&self.identity.agent_id, order_id)
            .await
    }

    pub async fn my_orders(&self, as_buyer: bool) -> Result<Vec<Order>> {
        self.marketplace
            .orders_for_agent(&self.identity.agent_id, as_buyer)
            .await
    }

    // --- Messaging ----------------------------------------------------

    pub async fn send_message(&self, message: Message) -> Result<Message> {
        self.messaging.send(&self.identity.agent_id, message).await
    }

    /// One direct message per currently-known peer. Each delivery is an
    /// independent single-record append; a failure partway leaves the
    /// earlier deliveries in place.
    pub async fn broadcast(&self, subject: &str, body: Payload) -> Result<Vec<Message>> {
        let peers = self.registry.list_agents(None, false).await?;
        let mut sent = Vec::new();
        for peer in peers {
            if peer.identity.agent_id == self.identity.agent_id {
                continue;
            }
            let message = Message::new(peer.identity.agent_id, subject, body.clone());
            sent.push(self.send_message(message).await?);
        }
        Ok(sent)
    }

    pub async fn inbox(&self, unread_only: bool) -> Result<Vec<Message>> {
        self.messaging.inbox(&self.identity.agent_id, unread_only).await
    }

    pub async fn mark_read(&self, message_id: Uuid) -> Result<Message> {
        self.messaging.mark_read(&self.identity.agent_id, message_id).await
    }

    // --- Knowledge ----------------------------------------------------

    pub async fn publish_knowledge(&self, entry: KnowledgeEntry) -> Result<KnowledgeEntry> {
        self.knowledge.publish(&self.identity.agent_id, entry).await
    }

    pub async fn query_knowledge(
        &self,
        tags: Option<&[String]>,
        min_confidence: f64,
        category: Option<&str>,
    ) -> Result<Vec<KnowledgeEntry>> {
        self.knowledge.query(tags, min_confidence, category).await
    }

    // --- Utility ------------------------------------------------------

    /// Read-only roll-up of this agent's network activity.
    pub async fn stats(&self) -> Result<NetworkStats> {
        let services = self.list_services(None, None).await?;
        let services_published = services
            .iter()
            .filter(|listing| listing.agent_id == self.identity.agent_id)
            .count();
        let orders_placed = self.my_orders(true).await?.len();
        let orders_received = self.my_orders(false).await?.len();
        let unread_messages = self.inbox(true).await?.len();

        Ok(NetworkStats {
            agent_id: self.identity.agent_id.clone(),
            name: self.identity.name.clone(),
            services_published,
            orders_placed,
            orders_received,
            unread_messages,
        })
    }
}
