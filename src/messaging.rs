//! Direct message delivery between agents.
//!
//! Each message is its own record under the recipient's inbox namespace, so
//! delivery is a single append. Semantics are at-least-once: a retried send
//! with a fresh `message_id` lands twice, and the core does not
//! deduplicate. Callers wanting idempotence reuse the same `Message`, since
//! an identical `message_id` replaces the same record.

use crate::{AgentId, ManifestRegistry, MeshError, Message, Result, SharedStore};
use std::sync::Arc;
use uuid::Uuid;

const INBOX_NAMESPACE: &str = "inbox";

#[derive(Clone)]
pub struct Messaging {
    store: Arc<dyn SharedStore>,
    registry: ManifestRegistry,
}

impl Messaging {
    pub fn new(store: Arc<dyn SharedStore>, registry: ManifestRegistry) -> Self {
        Self { store, registry }
    }

    fn message_key(agent_id: &str, message_id: Uuid) -> String {
        format!("{}/{}/{}", INBOX_NAMESPACE, agent_id, message_id)
    }

    pub async fn send(&self, sender: &AgentId, mut message: Message) -> Result<Message> {
        if message.to_agent.is_empty() {
            return Err(MeshError::Validation("to_agent must not be empty".to_string()));
        }
        if !self.registry.contains(&message.to_agent).await? {
            return Err(MeshError::NotFound(format!(
                "Recipient '{}' is not registered",
                message.to_agent
            )));
        }

        message.from_agent = sender.clone();
        let key = Self::message_key(&message.to_agent, message.message_id);
        self.store.put(&key, serde_json::to_value(&message)?).await?;
        tracing::debug!(
            "Message {} delivered from {} to {}",
            message.message_id,
            message.from_agent,
            message.to_agent
        );
        Ok(message)
    }

    /// Messages addressed to `agent_id`, oldest first.
    pub async fn inbox(&self, agent_id: &AgentId, unread_only: bool) -> Result<Vec<Message>> {
        let records = self
            .store
            .list(&format!("{}/{}/", INBOX_NAMESPACE, agent_id))
            .await?;
        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            let message: Message = serde_json::from_value(record)?;
            if unread_only && message.read {
                continue;
            }
            messages.push(message);
        }
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        Ok(messages)
    }

    /// Mark one of `recipient`'s messages as read. Only the recipient's own
    /// inbox is addressed, so nobody else can flip the flag.
    pub async fn mark_read(&self, recipient: &AgentId, message_id: Uuid) -> Result<Message> {
        let key = Self::message_key(recipient, message_id);
        let record = self.store.get(&key).await?.ok_or_else(|| {
            MeshError::NotFound(format!(
                "Message '{}' not found in inbox of '{}'",
                message_id, recipient
            ))
        })?;
        let mut message: Message = serde_json::from_value(record)?;
        if !message.read {
            message.read = true;
            self.store.put(&key, serde_json::to_value(&message)?).await?;
        }
        Ok(message)
    }
}
