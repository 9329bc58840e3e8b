//! Manifest persistence and liveness.
//!
//! Every call re-reads the shared medium; no in-process cache is trusted
//! across processes, so peers registered concurrently become visible on the
//! next call.

use crate::{AgentId, AgentManifest, MeshError, Result, SharedStore};
use chrono::{Duration, Utc};
use std::sync::Arc;

const AGENTS_NAMESPACE: &str = "agents";

#[derive(Clone)]
pub struct ManifestRegistry {
    store: Arc<dyn SharedStore>,
    liveness_window: Duration,
}

impl ManifestRegistry {
    pub fn new(store: Arc<dyn SharedStore>, liveness_window: Duration) -> Self {
        Self {
            store,
            liveness_window,
        }
    }

    pub fn liveness_window(&self) -> Duration {
        self.liveness_window
    }

    fn key(agent_id: &str) -> String {
        format!("{}/{}", AGENTS_NAMESPACE, agent_id)
    }

    /// Persist a manifest keyed by `agent_id`, stamping `last_seen`. The
    /// latest registration replaces the prior one wholesale; there is no
    /// merge of capability sets across registrations.
    pub async fn register(&self, mut manifest: AgentManifest) -> Result<AgentManifest> {
        manifest.validate()?;
        manifest.refresh_derived();
        manifest.last_seen = Utc::now();

        let record = serde_json::to_value(&manifest)?;
        self.store
            .put(&Self::key(&manifest.identity.agent_id), record)
            .await?;
        tracing::info!(
            "Registered agent {} ({} skills, {} actions)",
            manifest.identity.agent_id,
            manifest.total_skills(),
            manifest.total_actions
        );
        Ok(manifest)
    }

    /// Refresh `last_seen` on an existing registration without replacing
    /// the capability set.
    pub async fn heartbeat(&self, agent_id: &AgentId) -> Result<AgentManifest> {
        let mut manifest = self.get(agent_id).await?;
        manifest.last_seen = Utc::now();
        let record = serde_json::to_value(&manifest)?;
        self.store.put(&Self::key(agent_id), record).await?;
        Ok(manifest)
    }

    pub async fn get(&self, agent_id: &str) -> Result<AgentManifest> {
        let record = self
            .store
            .get(&Self::key(agent_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(format!("Agent '{}' is not registered", agent_id)))?;
        Ok(serde_json::from_value(record)?)
    }

    pub async fn contains(&self, agent_id: &str) -> Result<bool> {
        Ok(self.store.get(&Self::key(agent_id)).await?.is_some())
    }

    pub async fn list_agents(
        &self,
        agent_type: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<AgentManifest>> {
        let records = self.store.list(&format!("{}/", AGENTS_NAMESPACE)).await?;
        let mut manifests = Vec::with_capacity(records.len());
        for record in records {
            let manifest: AgentManifest = serde_json::from_value(record)?;
            if let Some(wanted) = agent_type {
                if manifest.identity.agent_type != wanted {
                    continue;
                }
            }
            if active_only && !manifest.is_active(self.liveness_window) {
                continue;
            }
            manifests.push(manifest);
        }
        manifests.sort_by(|a, b| a.identity.agent_id.cmp(&b.identity.agent_id));
        Ok(manifests)
    }
}
