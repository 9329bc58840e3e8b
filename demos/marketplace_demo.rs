//! Example demonstrating a complete marketplace flow
//!
//! This example shows how to:
//! 1. Join the network with a capability manifest
//! 2. Discover peers and match a task to an agent
//! 3. Publish a priced service
//! 4. Place an order and walk it through the state machine
//! 5. Exchange messages and shared knowledge

use agent_mesh::{
    AgentIdentity, AgentNetwork, Capability, CapabilityGroup, FsStore, KnowledgeEntry,
    MeshConfig, Message, Payload, ServiceListing, SharedStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MeshConfig::default();
    agent_mesh::init_tracing(&config.logging);

    println!("🕸️  Agent Mesh Demo");
    println!("==================\n");

    let shared_dir = tempfile::tempdir()?;

    // Two independent agent processes sharing one storage directory.
    let reviewer = network(shared_dir.path(), "agent_reviewer", "coder", &config);
    let buyer = network(shared_dir.path(), "agent_buyer", "general", &config);

    println!("1. Registering agents...");
    reviewer
        .register_capabilities(vec![CapabilityGroup::new(
            "code_review",
            "Code Review",
            "Automated review of pull requests",
            vec![Capability::new(
                "review_pull_request",
                "Review a pull request for defects and vulnerabilities",
                vec!["review".to_string(), "security".to_string()],
            )],
        )])
        .await?;
    buyer.register_capabilities(vec![]).await?;
    println!("   ✅ {} agents online\n", buyer.discover_agents(None, true).await?.len());

    println!("2. Matching a task to an agent...");
    let matches = buyer
        .find_agent_for_task("review my code for security issues")
        .await?;
    for m in &matches {
        println!(
            "   - {} / {} (score {:.2})",
            m.manifest.identity.agent_id, m.action, m.score
        );
    }

    println!("\n3. Publishing a service...");
    let listing = reviewer
        .publish_service(ServiceListing::new(
            "Security Review",
            "Full security review of one pull request",
            0.25,
            vec!["review".to_string(), "security".to_string()],
        ))
        .await?;
    println!("   📦 '{}' listed at ${}\n", listing.name, listing.price);

    println!("4. Ordering and fulfilling...");
    let mut params = Payload::new();
    params.insert("repo".to_string(), serde_json::json!("git://example/repo"));
    let order = buyer.create_order(listing.service_id, params).await?;
    println!("   📝 Order {} is {}", order.order_id, order.status);

    reviewer.accept_order(order.order_id).await?;
    let mut result = Payload::new();
    result.insert("findings".to_string(), serde_json::json!([]));
    let done = reviewer.fulfill_order(order.order_id, Some(result)).await?;
    println!("   ✅ Order is {}\n", done.status);

    println!("5. Messaging and knowledge...");
    buyer
        .send_message(Message::new("agent_reviewer", "Thanks!", Payload::new()))
        .await?;
    println!(
        "   📬 Reviewer inbox: {} unread",
        reviewer.inbox(true).await?.len()
    );

    buyer
        .publish_knowledge(KnowledgeEntry::new(
            "agent_reviewer turns orders around quickly",
            "market",
            0.8,
            vec!["reputation".to_string()],
        ))
        .await?;
    let known = reviewer
        .query_knowledge(Some(&["reputation".to_string()]), 0.5, None)
        .await?;
    println!("   🧠 Shared knowledge entries: {}", known.len());

    println!("\nDone.");
    Ok(())
}

fn network(
    shared_dir: &std::path::Path,
    agent_id: &str,
    agent_type: &str,
    config: &MeshConfig,
) -> AgentNetwork {
    let store: Arc<dyn SharedStore> = Arc::new(FsStore::new(shared_dir));
    let identity = AgentIdentity::new(agent_id, agent_id, "MESH", agent_type, "");
    AgentNetwork::new(identity, store, config)
}
