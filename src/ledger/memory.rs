//! In-memory ledger.
//!
//! Backs tests, the scenario harness, and deployments without a database.
//! Uniqueness of the order business key and of client emails is enforced
//! through index maps; `DashMap::entry` holds the shard lock across the
//! check-and-reserve, which is the atomic compare-and-write the admission
//! protocol's step-8 commit depends on.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{LedgerError, LedgerStore};
use crate::models::{Client, Order, OrderKey};
use crate::services::profit;

#[derive(Default)]
pub struct MemoryLedger {
    clients: DashMap<Uuid, Client>,
    /// Lower-cased email -> client id.
    emails: DashMap<String, Uuid>,
    orders: DashMap<Uuid, Order>,
    /// Business key -> order id.
    order_keys: DashMap<OrderKey, Uuid>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    fn sorted(mut items: Vec<Order>) -> Vec<Order> {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn insert_client(&self, client: Client) -> Result<Client, LedgerError> {
        match self.emails.entry(Self::email_key(&client.email)) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(client.id);
            }
        }
        self.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn update_client(&self, client: Client) -> Result<Client, LedgerError> {
        let old_email = self
            .clients
            .get(&client.id)
            .map(|existing| Self::email_key(&existing.email));
        let new_email = Self::email_key(&client.email);

        if old_email.as_deref() != Some(new_email.as_str()) {
            // Reserve the new address before releasing the old one; the
            // entry guard must drop before touching the map again.
            match self.emails.entry(new_email) {
                Entry::Occupied(slot) if *slot.get() != client.id => {
                    return Err(LedgerError::DuplicateEmail)
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(client.id);
                }
            }
            if let Some(old) = old_email {
                self.emails.remove(&old);
            }
        }
        self.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, LedgerError> {
        Ok(self.clients.get(&id).map(|c| c.clone()))
    }

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, LedgerError> {
        let id = self.emails.get(&Self::email_key(email)).map(|id| *id);
        Ok(id.and_then(|id| self.clients.get(&id).map(|c| c.clone())))
    }

    async fn list_clients(&self) -> Result<Vec<Client>, LedgerError> {
        let mut clients: Vec<Client> = self.clients.iter().map(|c| c.clone()).collect();
        clients.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(clients)
    }

    async fn search_clients(&self, keyword: &str) -> Result<Vec<Client>, LedgerError> {
        let needle = keyword.trim().to_lowercase();
        let mut hits: Vec<Client> = self
            .clients
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
                    || c.address
                        .as_deref()
                        .map_or(false, |a| a.to_lowercase().contains(&needle))
            })
            .map(|c| c.clone())
            .collect();
        hits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn insert_order(&self, order: Order) -> Result<Order, LedgerError> {
        match self.order_keys.entry(order.business_key()) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateOrderKey),
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn update_order(&self, order: Order) -> Result<Order, LedgerError> {
        let old_key = self
            .orders
            .get(&order.id)
            .map(|existing| existing.business_key());
        let new_key = order.business_key();

        if old_key.as_ref() != Some(&new_key) {
            match self.order_keys.entry(new_key) {
                Entry::Occupied(slot) if *slot.get() != order.id => {
                    return Err(LedgerError::DuplicateOrderKey)
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(order.id);
                }
            }
            if let Some(old) = old_key {
                self.order_keys.remove(&old);
            }
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, LedgerError> {
        match self.orders.remove(&id) {
            Some((_, order)) => {
                self.order_keys
                    .remove_if(&order.business_key(), |_, owner| *owner == id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn find_order_by_key(&self, key: &OrderKey) -> Result<Option<Order>, LedgerError> {
        let id = self.order_keys.get(key).map(|id| *id);
        Ok(id.and_then(|id| self.orders.get(&id).map(|o| o.clone())))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError> {
        Ok(Self::sorted(self.orders.iter().map(|o| o.clone()).collect()))
    }

    async fn list_orders_by_client(&self, client_id: Uuid) -> Result<Vec<Order>, LedgerError> {
        Ok(Self::sorted(
            self.orders
                .iter()
                .filter(|o| o.involves(client_id))
                .map(|o| o.clone())
                .collect(),
        ))
    }

    async fn net_position(&self, client_id: Uuid) -> Result<Decimal, LedgerError> {
        let orders = self.list_orders_by_client(client_id).await?;
        Ok(profit::net_position(client_id, &orders))
    }
}
