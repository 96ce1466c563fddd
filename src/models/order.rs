//! Order entity, business key and request payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A directed value transfer from consumer to supplier.
///
/// Created only through the admission protocol. Supplier, consumer and
/// price are immutable once committed; title and price may be corrected
/// afterwards under the same duplicate-key check.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub title: String,
    pub supplier_id: Uuid,
    pub consumer_id: Uuid,
    pub price: Decimal,
    /// Start of the processing window.
    pub started_at: DateTime<Utc>,
    /// End of the processing window; status changes at or before this
    /// instant invalidate the admission.
    pub finished_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn business_key(&self) -> OrderKey {
        OrderKey::new(&self.title, self.supplier_id, self.consumer_id)
    }

    pub fn involves(&self, client_id: Uuid) -> bool {
        self.supplier_id == client_id || self.consumer_id == client_id
    }
}

/// Duplicate-suppression key: (title lower-cased, supplier, consumer).
///
/// This triple is unique across all orders; the record identity is not
/// part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub title: String,
    pub supplier_id: Uuid,
    pub consumer_id: Uuid,
}

impl OrderKey {
    pub fn new(title: &str, supplier_id: Uuid, consumer_id: Uuid) -> Self {
        Self {
            title: title.trim().to_lowercase(),
            supplier_id,
            consumer_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub title: String,
    pub supplier_id: Uuid,
    pub consumer_id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub title: String,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_key_ignores_case_and_padding() {
        let supplier = Uuid::new_v4();
        let consumer = Uuid::new_v4();
        let a = OrderKey::new("  Widgets Q3 ", supplier, consumer);
        let b = OrderKey::new("widgets q3", supplier, consumer);
        assert_eq!(a, b);
    }

    #[test]
    fn business_key_distinguishes_roles() {
        let supplier = Uuid::new_v4();
        let consumer = Uuid::new_v4();
        let forward = OrderKey::new("widgets", supplier, consumer);
        let reversed = OrderKey::new("widgets", consumer, supplier);
        assert_ne!(forward, reversed);
    }
}
