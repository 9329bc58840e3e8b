use agent_mesh::{
    AgentIdentity, AgentManifest, AgentNetwork, Capability, CapabilityGroup, FsStore,
    KnowledgeEntry, MeshConfig, MeshError, Message, OrderStatus, Payload, ServiceListing,
    SharedStore,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{sleep, Duration};

fn network(dir: &TempDir, agent_id: &str, agent_type: &str) -> AgentNetwork {
    let store: Arc<dyn SharedStore> = Arc::new(FsStore::new(dir.path()));
    let identity = AgentIdentity::new(agent_id, agent_id, "TCK", agent_type, "");
    AgentNetwork::new(identity, store, &MeshConfig::default())
}

fn reviewer_manifest(agent_id: &str) -> AgentManifest {
    let identity = AgentIdentity::new(agent_id, "Reviewer", "RVW", "coder", "code review");
    let group = CapabilityGroup::new(
        "code_review",
        "Code Review",
        "Automated code review",
        vec![Capability::new(
            "review_pull_request",
            "Review a pull request for defects",
            vec!["review".to_string(), "security".to_string()],
        )],
    );
    AgentManifest::new(identity, vec![group])
}

#[tokio::test]
async fn test_registration_is_last_write_wins() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let agent = network(&dir, "agent_a", "coder");

    agent.register(reviewer_manifest("agent_a")).await?;

    let mut slimmer = reviewer_manifest("agent_a");
    slimmer.capabilities.clear();
    agent.register(slimmer).await?;

    let fetched = agent.get_agent("agent_a").await?;
    assert_eq!(fetched.total_actions, 0);
    assert!(fetched.capabilities.is_empty());

    let all = agent.discover_agents(None, false).await?;
    assert_eq!(all.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_discovery_filters_by_type() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let coder = network(&dir, "agent_coder", "coder");
    let writer = network(&dir, "agent_writer", "writer");
    coder.register(reviewer_manifest("agent_coder")).await?;
    writer.register_capabilities(vec![]).await?;

    let coders = writer.discover_agents(Some("coder"), true).await?;
    assert_eq!(coders.len(), 1);
    assert_eq!(coders[0].identity.agent_id, "agent_coder");

    assert!(matches!(
        writer.get_agent("agent_ghost").await,
        Err(MeshError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_task_matching_ranks_tagged_capability_first() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let reviewer = network(&dir, "agent_reviewer", "coder");
    let poet = network(&dir, "agent_poet", "writer");
    let buyer = network(&dir, "agent_buyer", "general");

    reviewer.register(reviewer_manifest("agent_reviewer")).await?;
    let poetry = CapabilityGroup::new(
        "poetry",
        "Poetry",
        "Verse on demand",
        vec![Capability::new(
            "compose_haiku",
            "Compose a haiku about anything",
            vec!["poetry".to_string()],
        )],
    );
    poet.register_capabilities(vec![poetry]).await?;
    buyer.register_capabilities(vec![]).await?;

    let matches = buyer
        .find_agent_for_task("review my code for security issues")
        .await?;
    assert!(!matches.is_empty());
    assert_eq!(matches[0].manifest.identity.agent_id, "agent_reviewer");
    assert_eq!(matches[0].skill_id, "code_review");
    assert_eq!(matches[0].action, "review_pull_request");
    assert!(matches.iter().all(|m| m.score > 0.0));
    // The poet's only capability scores zero and is excluded entirely.
    assert!(matches
        .iter()
        .all(|m| m.manifest.identity.agent_id != "agent_poet"));
    Ok(())
}

#[tokio::test]
async fn test_matching_is_deterministic_for_equal_scores() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let buyer = network(&dir, "agent_buyer", "general");
    buyer.register_capabilities(vec![]).await?;

    let audit = |manifest_suffix: &str| {
        CapabilityGroup::new(
            format!("audit_{}", manifest_suffix),
            "Audit",
            "Security audit",
            vec![Capability::new(
                "audit",
                "Audit a codebase",
                vec!["security".to_string()],
            )],
        )
    };

    // agent_b carries an extra unrelated action, so it is more established.
    let a = network(&dir, "agent_a", "coder");
    a.register_capabilities(vec![audit("a")]).await?;
    let b = network(&dir, "agent_b", "coder");
    let extra = CapabilityGroup::new(
        "formatting",
        "Formatting",
        "Code formatting",
        vec![Capability::new("format", "Reformat code", vec![])],
    );
    b.register_capabilities(vec![audit("b"), extra]).await?;

    let matches = buyer.find_agent_for_task("security").await?;
    assert_eq!(matches[0].manifest.identity.agent_id, "agent_b");
    assert_eq!(matches[1].manifest.identity.agent_id, "agent_a");

    // Strip the extra action: scores and totals tie, lower agent_id wins.
    b.register_capabilities(vec![audit("b")]).await?;
    let matches = buyer.find_agent_for_task("security").await?;
    assert_eq!(matches[0].manifest.identity.agent_id, "agent_a");
    assert_eq!(matches[1].manifest.identity.agent_id, "agent_b");
    Ok(())
}

#[tokio::test]
async fn test_order_flow_end_to_end() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let seller = network(&dir, "agent_seller", "coder");
    let buyer = network(&dir, "agent_buyer", "general");

    seller.register(reviewer_manifest("agent_seller")).await?;
    buyer.register_capabilities(vec![]).await?;

    let matches = buyer
        .find_agent_for_task("review my code for security issues")
        .await?;
    assert_eq!(matches[0].manifest.identity.agent_id, "agent_seller");

    let listing = seller
        .publish_service(ServiceListing::new(
            "Security Review",
            "Reviews a pull request for security issues",
            0.25,
            vec!["review".to_string(), "security".to_string()],
        ))
        .await?;

    let mut params = Payload::new();
    params.insert(
        "repo".to_string(),
        serde_json::Value::String("git://example/repo".to_string()),
    );
    let order = buyer.create_order(listing.service_id, params).await?;
    assert_eq!(order.status, OrderStatus::Pending);

    sleep(Duration::from_millis(5)).await;
    seller.accept_order(order.order_id).await?;
    sleep(Duration::from_millis(5)).await;

    let mut result = Payload::new();
    result.insert("findings".to_string(), serde_json::json!(["CVE-2024-0001"]));
    seller.fulfill_order(order.order_id, Some(result)).await?;

    let finished = buyer.get_order(order.order_id).await?;
    assert_eq!(finished.status, OrderStatus::Fulfilled);
    assert!(finished.updated_at > finished.created_at);
    assert!(finished.result.is_some());
    Ok(())
}

#[tokio::test]
async fn test_order_permission_and_state_errors() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let seller = network(&dir, "agent_seller", "coder");
    let buyer = network(&dir, "agent_buyer", "general");
    let bystander = network(&dir, "agent_bystander", "general");

    seller.register_capabilities(vec![]).await?;
    buyer.register_capabilities(vec![]).await?;
    bystander.register_capabilities(vec![]).await?;

    let listing = seller
        .publish_service(ServiceListing::new("Review", "Code review", 0.10, vec![]))
        .await?;
    let order = buyer.create_order(listing.service_id, Payload::new()).await?;

    assert!(matches!(
        bystander.accept_order(order.order_id).await,
        Err(MeshError::Permission(_))
    ));

    seller.accept_order(order.order_id).await?;
    assert!(matches!(
        seller.accept_order(order.order_id).await,
        Err(MeshError::InvalidState(_))
    ));

    // The buyer may still cancel an accepted order; afterwards it is terminal.
    buyer.cancel_order(order.order_id).await?;
    assert!(matches!(
        seller.fulfill_order(order.order_id, None).await,
        Err(MeshError::InvalidState(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_orders_against_missing_or_withdrawn_services() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let seller = network(&dir, "agent_seller", "coder");
    let buyer = network(&dir, "agent_buyer", "general");
    seller.register_capabilities(vec![]).await?;
    buyer.register_capabilities(vec![]).await?;

    assert!(matches!(
        buyer.create_order(uuid::Uuid::new_v4(), Payload::new()).await,
        Err(MeshError::NotFound(_))
    ));

    let listing = seller
        .publish_service(ServiceListing::new("Review", "Code review", 0.10, vec![]))
        .await?;
    seller.withdraw_service(listing.service_id).await?;

    assert!(buyer.list_services(None, None).await?.is_empty());
    assert!(matches!(
        buyer.create_order(listing.service_id, Payload::new()).await,
        Err(MeshError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_messaging_round_trip() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let a = network(&dir, "agent_a", "general");
    let b = network(&dir, "agent_b", "general");
    a.register_capabilities(vec![]).await?;
    b.register_capabilities(vec![]).await?;

    assert!(matches!(
        a.send_message(Message::new("agent_ghost", "hello", Payload::new()))
            .await,
        Err(MeshError::NotFound(_))
    ));

    a.send_message(Message::new("agent_b", "first", Payload::new()))
        .await?;
    sleep(Duration::from_millis(5)).await;
    let second = a
        .send_message(Message::new("agent_b", "second", Payload::new()))
        .await?;

    let inbox = b.inbox(false).await?;
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].subject, "first");
    assert_eq!(inbox[0].from_agent, "agent_a");

    b.mark_read(second.message_id).await?;
    let unread = b.inbox(true).await?;
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].subject, "first");
    Ok(())
}

#[tokio::test]
async fn test_knowledge_publish_and_query() -> agent_mesh::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let agent = network(&dir, "agent_a", "general");
    agent.register_capabilities(vec![]).await?;

    assert!(matches!(
        agent
            .publish_knowledge(KnowledgeEntry::new("too sure", "market", 1.5, vec![]))
            .await,
        Err(MeshError::Validation(_))
    ));

    agent
        .publish_knowledge(KnowledgeEntry::new(
            "bundle discounts move volume",
            "strategy",
            0.5,
            vec!["pricing".to_string()],
        ))
        .await?;

    let found = agent
        .query_knowledge(Some(&["pricing".to_string()]), 0.4, None)
        .await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].author_agent_id, "agent_a");

    assert!(agent.query_knowledge(None, 0.6, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_two_processes_share_one_medium() -> agent_mesh::Result<()> {
    // Two facades with independent store handles over the same directory
    // observe each other's writes on the next call, like two processes
    // sharing a mounted directory.
    let dir = tempfile::tempdir().unwrap();
    let a = network(&dir, "agent_a", "general");
    a.register_capabilities(vec![]).await?;

    let b = network(&dir, "agent_b", "general");
    b.register_capabilities(vec![]).await?;

    let seen_by_a = a.discover_agents(None, true).await?;
    assert_eq!(seen_by_a.len(), 2);

    let stats = a.stats().await?;
    assert_eq!(stats.agent_id, "agent_a");
    assert_eq!(stats.services_published, 0);
    Ok(())
}
