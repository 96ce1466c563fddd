//! Ledger Store
//!
//! Keyed storage of clients and orders behind the `LedgerStore` trait.
//! Both backends enforce the order business key and the case-insensitive
//! client email uniqueness; callers get a typed duplicate signal rather
//! than a generic storage error, which the admission protocol relies on
//! to resolve benign commit races.

pub mod lock;
pub mod memory;
pub mod postgres;

pub use lock::ClientLockManager;
pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Client, Order, OrderKey};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The order business key (title, supplier, consumer) already exists.
    #[error("order business key already exists")]
    DuplicateOrderKey,

    /// The client email already exists (case-insensitive).
    #[error("client email already exists")]
    DuplicateEmail,

    /// Storage failure; the caller may retry.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                let constraint = db.constraint().unwrap_or_default();
                return if constraint.contains("email") {
                    LedgerError::DuplicateEmail
                } else {
                    LedgerError::DuplicateOrderKey
                };
            }
        }
        LedgerError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Clients
    async fn insert_client(&self, client: Client) -> Result<Client, LedgerError>;
    async fn update_client(&self, client: Client) -> Result<Client, LedgerError>;
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, LedgerError>;
    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, LedgerError>;
    async fn list_clients(&self) -> Result<Vec<Client>, LedgerError>;
    async fn search_clients(&self, keyword: &str) -> Result<Vec<Client>, LedgerError>;

    // Orders
    async fn insert_order(&self, order: Order) -> Result<Order, LedgerError>;
    async fn update_order(&self, order: Order) -> Result<Order, LedgerError>;
    async fn delete_order(&self, id: Uuid) -> Result<bool, LedgerError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, LedgerError>;
    async fn find_order_by_key(&self, key: &OrderKey) -> Result<Option<Order>, LedgerError>;
    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError>;
    async fn list_orders_by_client(&self, client_id: Uuid) -> Result<Vec<Order>, LedgerError>;

    /// Net position of a client over the committed order set.
    ///
    /// Must equal `services::profit::net_position` over the same data.
    async fn net_position(&self, client_id: Uuid) -> Result<Decimal, LedgerError>;
}
