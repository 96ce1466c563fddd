//! Client service: CRUD, search, profit reporting, and the status
//! mutator consulted by the admission protocol.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::error::ServiceError;
use crate::ledger::LedgerStore;
use crate::models::{
    Client, ClientProfit, CreateClientRequest, Order, UpdateClientRequest,
};

pub struct ClientService {
    store: Arc<dyn LedgerStore>,
}

impl ClientService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateClientRequest) -> Result<Client, ServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Client name must not be blank".to_string(),
            ));
        }
        let email = request.email.trim();
        if email.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Client email must not be blank".to_string(),
            ));
        }

        if self.store.find_client_by_email(email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email already exists: {email}"
            )));
        }

        let address = request
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let client = self
            .store
            .insert_client(Client::new(name.to_string(), email.to_string(), address))
            .await?;
        info!(client_id = %client.id, "client created");
        Ok(client)
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, ServiceError> {
        self.require(id).await
    }

    /// All clients, or a keyword search over name/email/address.
    pub async fn list_or_search(&self, query: Option<&str>) -> Result<Vec<Client>, ServiceError> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => Ok(self.store.list_clients().await?),
            Some(q) if q.chars().count() < 3 => Err(ServiceError::InvalidArgument(
                "Search keyword must be at least 3 characters".to_string(),
            )),
            Some(q) => Ok(self.store.search_clients(q).await?),
        }
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateClientRequest,
    ) -> Result<Client, ServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Client name must not be blank".to_string(),
            ));
        }
        let email = request.email.trim();
        if email.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Client email must not be blank".to_string(),
            ));
        }

        let mut client = self.require(id).await?;

        if let Some(other) = self.store.find_client_by_email(email).await? {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "Email already exists: {email}"
                )));
            }
        }

        client.name = name.to_string();
        client.email = email.to_string();
        client.address = request
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        client.updated_at = Utc::now();

        Ok(self.store.update_client(client).await?)
    }

    /// Toggle the active flag. Idempotent: a call that would not change
    /// the state writes nothing and returns the current row. The
    /// deactivation timestamp is set only on a true active→inactive
    /// transition and cleared on reactivation; the admission protocol
    /// compares it against its processing-window finish time.
    ///
    /// Does not take the admission pair lock; in-flight admissions
    /// re-check status under their own lock against the window finish
    /// time.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Client, ServiceError> {
        let mut client = self.require(id).await?;

        let changed = if active {
            if client.active {
                false
            } else {
                client.active = true;
                client.deactivated_at = None;
                true
            }
        } else if client.active {
            client.active = false;
            client.deactivated_at = Some(Utc::now());
            true
        } else {
            false
        };

        if !changed {
            return Ok(client);
        }

        client.updated_at = Utc::now();
        let saved = self.store.update_client(client).await?;
        info!(client_id = %saved.id, active = saved.active, "client status changed");
        Ok(saved)
    }

    pub async fn orders_of(&self, id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.require(id).await?;
        Ok(self.store.list_orders_by_client(id).await?)
    }

    pub async fn profit(&self, id: Uuid) -> Result<ClientProfit, ServiceError> {
        let client = self.require(id).await?;
        let profit = self.store.net_position(client.id).await?;
        Ok(ClientProfit {
            client_id: client.id,
            name: client.name,
            email: client.email,
            active: client.active,
            profit,
        })
    }

    /// Clients whose net position falls inside `[min, max]`; either bound
    /// may be open.
    pub async fn profit_range(
        &self,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Result<Vec<ClientProfit>, ServiceError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ServiceError::InvalidArgument(
                    "min must be <= max".to_string(),
                ));
            }
        }

        let mut result = Vec::new();
        for client in self.store.list_clients().await? {
            let profit = self.store.net_position(client.id).await?;
            if min.map_or(true, |lo| profit >= lo) && max.map_or(true, |hi| profit <= hi) {
                result.push(ClientProfit {
                    client_id: client.id,
                    name: client.name,
                    email: client.email,
                    active: client.active,
                    profit,
                });
            }
        }
        Ok(result)
    }

    async fn require(&self, id: Uuid) -> Result<Client, ServiceError> {
        self.store
            .get_client(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Client not found: id={id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    fn service() -> ClientService {
        ClientService::new(Arc::new(MemoryLedger::new()))
    }

    fn request(name: &str, email: &str) -> CreateClientRequest {
        CreateClientRequest {
            name: name.to_string(),
            email: email.to_string(),
            address: None,
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_name_and_duplicate_email() {
        let clients = service();
        let err = clients.create(request("   ", "a@mail.test")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        clients.create(request("A", "a@mail.test")).await.unwrap();
        let err = clients.create(request("B", "A@MAIL.TEST")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn search_keyword_must_be_three_chars() {
        let clients = service();
        let err = clients.list_or_search(Some("ab")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert!(clients.list_or_search(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_active_is_idempotent() {
        let clients = service();
        let created = clients.create(request("A", "a@mail.test")).await.unwrap();

        let off = clients.set_active(created.id, false).await.unwrap();
        assert!(!off.active);
        let stamp = off.deactivated_at.expect("deactivation timestamp");

        // Second deactivation is a no-op: same timestamp, no write.
        let off_again = clients.set_active(created.id, false).await.unwrap();
        assert_eq!(off_again.deactivated_at, Some(stamp));
        assert_eq!(off_again.updated_at, off.updated_at);

        let on = clients.set_active(created.id, true).await.unwrap();
        assert!(on.active);
        assert!(on.deactivated_at.is_none());

        let on_again = clients.set_active(created.id, true).await.unwrap();
        assert_eq!(on_again.updated_at, on.updated_at);
    }

    #[tokio::test]
    async fn profit_range_validates_bounds() {
        let clients = service();
        let err = clients
            .profit_range(Some(Decimal::TEN), Some(Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        clients.create(request("A", "a@mail.test")).await.unwrap();
        let all = clients.profit_range(None, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].profit, Decimal::ZERO);
    }

    #[tokio::test]
    async fn update_rejects_taken_email_but_allows_own() {
        let clients = service();
        let a = clients.create(request("A", "a@mail.test")).await.unwrap();
        clients.create(request("B", "b@mail.test")).await.unwrap();

        let err = clients
            .update(
                a.id,
                UpdateClientRequest {
                    name: "A2".into(),
                    email: "b@mail.test".into(),
                    address: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = clients
            .update(
                a.id,
                UpdateClientRequest {
                    name: "A2".into(),
                    email: "A@mail.test".into(),
                    address: Some("  Main St 1  ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "A2");
        assert_eq!(updated.address.as_deref(), Some("Main St 1"));
    }
}
