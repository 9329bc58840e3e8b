//! Lexical matching of free-text task descriptions against advertised
//! capabilities.
//!
//! Scoring is weighted token overlap: a query token that hits one of a
//! capability's tags counts double what a hit against its name or
//! description words counts, normalized so scores land in [0, 1]. The exact
//! numbers are a design choice; the load-bearing contract is the ordering:
//! higher score first, ties broken by `total_actions` descending and then
//! `agent_id` ascending so equal inputs always rank identically.

use crate::{AgentManifest, Capability, ManifestRegistry, Result};
use std::cmp::Ordering;
use std::collections::HashSet;

const TAG_WEIGHT: f64 = 2.0;
const TEXT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct TaskMatch {
    pub manifest: AgentManifest,
    pub skill_id: String,
    pub action: String,
    pub score: f64,
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

fn score_capability(tokens: &HashSet<String>, capability: &Capability) -> f64 {
    let tags: HashSet<String> = capability.tags.iter().map(|t| t.to_lowercase()).collect();
    let words = tokenize(&format!("{} {}", capability.name, capability.description));

    let mut weighted_hits = 0.0;
    for token in tokens {
        if tags.contains(token) {
            weighted_hits += TAG_WEIGHT;
        } else if words.contains(token) {
            weighted_hits += TEXT_WEIGHT;
        }
    }
    (weighted_hits / (TAG_WEIGHT * tokens.len() as f64)).min(1.0)
}

fn compare_matches(a: &TaskMatch, b: &TaskMatch) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.manifest.total_actions.cmp(&a.manifest.total_actions))
        .then_with(|| a.manifest.identity.agent_id.cmp(&b.manifest.identity.agent_id))
        .then_with(|| a.skill_id.cmp(&b.skill_id))
        .then_with(|| a.action.cmp(&b.action))
}

/// Score every capability of every given manifest against `text` and return
/// the candidates ranked best-first. Zero-score capabilities are dropped.
pub fn rank(manifests: &[AgentManifest], text: &str, min_score: f64) -> Vec<TaskMatch> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for manifest in manifests {
        for group in &manifest.capabilities {
            for action in &group.actions {
                let score = score_capability(&tokens, action);
                if score > min_score && score > 0.0 {
                    matches.push(TaskMatch {
                        manifest: manifest.clone(),
                        skill_id: group.skill_id.clone(),
                        action: action.name.clone(),
                        score,
                    });
                }
            }
        }
    }
    matches.sort_by(compare_matches);
    matches
}

#[derive(Clone)]
pub struct TaskMatcher {
    registry: ManifestRegistry,
    min_score: f64,
}

impl TaskMatcher {
    pub fn new(registry: ManifestRegistry, min_score: f64) -> Self {
        Self {
            registry,
            min_score,
        }
    }

    /// Rank the capabilities of every active agent against a task
    /// description, re-reading the registry so concurrently registered
    /// peers are considered.
    pub async fn find_agent_for_task(&self, text: &str) -> Result<Vec<TaskMatch>> {
        let manifests = self.registry.list_agents(None, true).await?;
        Ok(rank(&manifests, text, self.min_score))
    }
}
