//! Client entity and request payloads.
//!
//! A client participates in orders as supplier or consumer. The
//! `deactivated_at` timestamp is set on a true active→inactive transition
//! and cleared on reactivation; the admission protocol compares it against
//! the processing-window finish time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    /// Unique, case-insensitive.
    pub email: String,
    pub address: Option<String>,
    pub active: bool,
    /// Non-null iff `active == false`.
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// New clients start active with no deactivation timestamp.
    pub fn new(name: String, email: String, address: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            address,
            active: true,
            deactivated_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatusRequest {
    pub active: bool,
}

/// Reporting view: a client together with its current net position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfit {
    pub client_id: Uuid,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub profit: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_starts_active() {
        let c = Client::new("Acme".into(), "acme@mail.test".into(), None);
        assert!(c.active);
        assert!(c.deactivated_at.is_none());
        assert_eq!(c.created_at, c.updated_at);
    }
}
