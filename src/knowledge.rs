//! Shared knowledge base: tagged, confidence-scored facts any agent can
//! publish and query. Append-only; stale entries are filtered at query time
//! by confidence, never purged by the core.

use crate::{AgentId, KnowledgeEntry, MeshError, Result, SharedStore};
use std::sync::Arc;
use uuid::Uuid;

const KNOWLEDGE_NAMESPACE: &str = "knowledge";

#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<dyn SharedStore>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn entry_key(entry_id: Uuid) -> String {
        format!("{}/{}", KNOWLEDGE_NAMESPACE, entry_id)
    }

    pub async fn publish(
        &self,
        author: &AgentId,
        mut entry: KnowledgeEntry,
    ) -> Result<KnowledgeEntry> {
        entry.author_agent_id = author.clone();
        entry.validate()?;

        let record = serde_json::to_value(&entry)?;
        self.store.put(&Self::entry_key(entry.entry_id), record).await?;
        tracing::debug!(
            "Knowledge entry {} published by {} (confidence {})",
            entry.entry_id,
            author,
            entry.confidence
        );
        Ok(entry)
    }

    /// Matching entries, newest first. Tag matching is ANY-overlap;
    /// `min_confidence` is inclusive.
    pub async fn query(
        &self,
        tags: Option<&[String]>,
        min_confidence: f64,
        category: Option<&str>,
    ) -> Result<Vec<KnowledgeEntry>> {
        let records = self.store.list(&format!("{}/", KNOWLEDGE_NAMESPACE)).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let entry: KnowledgeEntry = serde_json::from_value(record)?;
            if entry.confidence < min_confidence {
                continue;
            }
            if let Some(wanted) = category {
                if entry.category != wanted {
                    continue;
                }
            }
            if let Some(wanted) = tags {
                if !wanted.iter().any(|tag| entry.tags.contains(tag)) {
                    continue;
                }
            }
            entries.push(entry);
        }
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        Ok(entries)
    }

    pub async fn get(&self, entry_id: Uuid) -> Result<KnowledgeEntry> {
        let record = self
            .store
            .get(&Self::entry_key(entry_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(format!("Knowledge entry '{}' not found", entry_id)))?;
        Ok(serde_json::from_value(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn knowledge() -> KnowledgeBase {
        KnowledgeBase::new(Arc::new(MemoryStore::new()))
    }

    fn entry(content: &str, category: &str, confidence: f64, tags: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry::new(
            content,
            category,
            confidence,
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_publish_rejects_out_of_range_confidence() {
        let kb = knowledge();
        let author = "a1".to_string();
        let err = kb.publish(&author, entry("sure thing", "market", 1.5, &[])).await;
        assert!(matches!(err, Err(MeshError::Validation(_))));
    }

    #[tokio::test]
    async fn test_query_by_confidence_and_tags() {
        let kb = knowledge();
        let author = "a1".to_string();
        kb.publish(&author, entry("undercut rivals", "strategy", 0.5, &["pricing"]))
            .await
            .unwrap();
        kb.publish(&author, entry("rumor mill", "market", 0.2, &["gossip"]))
            .await
            .unwrap();

        let priced = kb
            .query(Some(&["pricing".to_string()]), 0.4, None)
            .await
            .unwrap();
        assert_eq!(priced.len(), 1);
        assert_eq!(priced[0].content, "undercut rivals");

        assert!(kb.query(None, 0.6, None).await.unwrap().is_empty());
        assert_eq!(kb.query(None, 0.2, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tag_match_is_any_overlap() {
        let kb = knowledge();
        let author = "a1".to_string();
        kb.publish(
            &author,
            entry("bundle compute with storage", "strategy", 0.8, &["pricing", "compute"]),
        )
        .await
        .unwrap();

        let found = kb
            .query(Some(&["compute".to_string(), "unrelated".to_string()]), 0.0, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_query_by_category_newest_first() {
        let kb = knowledge();
        let author = "a1".to_string();
        kb.publish(&author, entry("older", "market", 0.5, &[])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        kb.publish(&author, entry("newer", "market", 0.5, &[])).await.unwrap();
        kb.publish(&author, entry("other", "strategy", 0.5, &[])).await.unwrap();

        let market = kb.query(None, 0.0, Some("market")).await.unwrap();
        assert_eq!(market.len(), 2);
        assert_eq!(market[0].content, "newer");
        assert_eq!(market[1].content, "older");
    }
}
