//! Service listings and the order lifecycle.
//!
//! Listings are immutable once published apart from the withdrawal flag.
//! Order status transitions are driven by the owning seller, except for
//! cancellation which belongs to the buyer; every transition replaces the
//! single order record and stamps `updated_at`.

use crate::{AgentId, MeshError, Order, Payload, Result, ServiceListing, SharedStore};
use std::sync::Arc;
use uuid::Uuid;

const SERVICES_NAMESPACE: &str = "services";
const ORDERS_NAMESPACE: &str = "orders";

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn SharedStore>,
}

impl Marketplace {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn service_key(service_id: Uuid) -> String {
        format!("{}/{}", SERVICES_NAMESPACE, service_id)
    }

    fn order_key(order_id: Uuid) -> String {
        format!("{}/{}", ORDERS_NAMESPACE, order_id)
    }

    pub async fn publish_service(
        &self,
        owner: &AgentId,
        mut listing: ServiceListing,
    ) -> Result<ServiceListing> {
        listing.agent_id = owner.clone();
        listing.validate()?;

        let record = serde_json::to_value(&listing)?;
        self.store.put(&Self::service_key(listing.service_id), record).await?;
        tracing::info!(
            "Published service '{}' ({}) at price {}",
            listing.name,
            listing.service_id,
            listing.price
        );
        Ok(listing)
    }

    pub async fn get_service(&self, service_id: Uuid) -> Result<ServiceListing> {
        let record = self
            .store
            .get(&Self::service_key(service_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(format!("Service '{}' not found", service_id)))?;
        Ok(serde_json::from_value(record)?)
    }

    /// All non-withdrawn listings matching the filters, newest first.
    pub async fn list_services(
        &self,
        tags: Option<&[String]>,
        max_price: Option<f64>,
    ) -> Result<Vec<ServiceListing>> {
        let records = self.store.list(&format!("{}/", SERVICES_NAMESPACE)).await?;
        let mut listings = Vec::with_capacity(records.len());
        for record in records {
            let listing: ServiceListing = serde_json::from_value(record)?;
            if listing.withdrawn {
                continue;
            }
            if let Some(ceiling) = max_price {
                if listing.price > ceiling {
                    continue;
                }
            }
            if let Some(wanted) = tags {
                if !wanted.iter().any(|tag| listing.tags.contains(tag)) {
                    continue;
                }
            }
            listings.push(listing);
        }
        listings.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.service_id.cmp(&b.service_id))
        });
        Ok(listings)
    }

    /// Flip the withdrawal flag. Owner-only; idempotent.
    pub async fn withdraw_service(&self, actor: &AgentId, service_id: Uuid) -> Result<ServiceListing> {
        let mut listing = self.get_service(service_id).await?;
        if listing.agent_id != *actor {
            return Err(MeshError::Permission(format!(
                "Agent '{}' does not own service '{}'",
                actor, service_id
            )));
        }
        if !listing.withdrawn {
            listing.withdrawn = true;
            let record = serde_json::to_value(&listing)?;
            self.store.put(&Self::service_key(service_id), record).await?;
            tracing::info!("Withdrew service '{}'", service_id);
        }
        Ok(listing)
    }

    pub async fn create_order(
        &self,
        buyer: &AgentId,
        service_id: Uuid,
        params: Payload,
    ) -> Result<Order> {
        let listing = self.get_service(service_id).await?;
        if listing.withdrawn {
            return Err(MeshError::NotFound(format!(
                "Service '{}' has been withdrawn",
                service_id
            )));
        }

        let order = Order::new(service_id, buyer.clone(), params);
        let record = serde_json::to_value(&order)?;
        self.store.put(&Self::order_key(order.order_id), record).await?;
        tracing::info!(
            "Order {} created against service '{}' by {}",
            order.order_id,
            listing.name,
            buyer
        );
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
        let record = self
            .store
            .get(&Self::order_key(order_id))
            .await?
            .ok_or_else(|| MeshError::NotFound(format!("Order '{}' not found", order_id)))?;
        Ok(serde_json::from_value(record)?)
    }

    pub async fn accept_order(&self, actor: &AgentId, order_id: Uuid) -> Result<Order> {
        let mut order = self.seller_checked(actor, order_id).await?;
        order.accept()?;
        self.save_order(&order).await?;
        Ok(order)
    }

    pub async fn reject_order(&self, actor: &AgentId, order_id: Uuid) -> Result<Order> {
        let mut order = self.seller_checked(actor, order_id).await?;
        order.reject()?;
        self.save_order(&order).await?;
        Ok(order)
    }

    pub async fn fulfill_order(
        &self,
        actor: &AgentId,
        order_id: Uuid,
        result: Option<Payload>,
    ) -> Result<Order> {
        let mut order = self.seller_checked(actor, order_id).await?;
        order.fulfill(result)?;
        self.save_order(&order).await?;
        Ok(order)
    }

    /// Buyer-initiated cancellation; valid from `pending` or `accepted`.
    pub async fn cancel_order(&self, actor: &AgentId, order_id: Uuid) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        if order.buyer_agent_id != *actor {
            return Err(MeshError::Permission(format!(
                "Agent '{}' is not the buyer of order '{}'",
                actor, order_id
            )));
        }
        order.cancel()?;
        self.save_order(&order).await?;
        Ok(order)
    }

    /// Orders this agent placed (`as_buyer`) or received against its
    /// services (`!as_buyer`), newest first.
    pub async fn orders_for_agent(&self, agent_id: &AgentId, as_buyer: bool) -> Result<Vec<Order>> {
        let records = self.store.list(&format!("{}/", ORDERS_NAMESPACE)).await?;
        let mut owned_services: Option<Vec<Uuid>> = None;
        if !as_buyer {
            let records = self.store.list(&format!("{}/", SERVICES_NAMESPACE)).await?;
            let mut ids = Vec::new();
            for record in records {
                let listing: ServiceListing = serde_json::from_value(record)?;
                if listing.agent_id == *agent_id {
                    ids.push(listing.service_id);
                }
            }
            owned_services = Some(ids);
        }

        let mut orders = Vec::new();
        for record in records {
            let order: Order = serde_json::from_value(record)?;
            let keep = match &owned_services {
                None => order.buyer_agent_id == *agent_id,
                Some(ids) => ids.contains(&order.service_id),
            };
            if keep {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        Ok(orders)
    }

    async fn seller_checked(&self, actor: &AgentId, order_id: Uuid) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        let listing = self.get_service(order.service_id).await?;
        if listing.agent_id != *actor {
            return Err(MeshError::Permission(format!(
                "Agent '{}' does not own the service behind order '{}'",
                actor, order_id
            )));
        }
        Ok(order)
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let record = serde_json::to_value(order)?;
        self.store.put(&Self::order_key(order.order_id), record).await?;
        tracing::debug!("Order {} moved to {}", order.order_id, order.status);
        Ok(())
    }
}
