//! Postgres ledger.
//!
//! Runtime queries only, so the crate builds without a live database.
//! Unique-constraint violations surface as the typed duplicate errors via
//! `LedgerError::from`; the business-key index (`uk_order_business_key`,
//! see `migrations/0001_init.sql`) is what turns a commit race into a
//! clean duplicate signal instead of a second committed row.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{LedgerError, LedgerStore};
use crate::models::{Client, Order, OrderKey};

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn insert_client(&self, client: Client) -> Result<Client, LedgerError> {
        let row = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, name, email, address, active, deactivated_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.address)
        .bind(client.active)
        .bind(client.deactivated_at)
        .bind(client.created_at)
        .bind(client.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_client(&self, client: Client) -> Result<Client, LedgerError> {
        let row = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = $2, email = $3, address = $4, active = $5,
                deactivated_at = $6, updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.address)
        .bind(client.active)
        .bind(client.deactivated_at)
        .bind(client.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, LedgerError> {
        let row = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, LedgerError> {
        let row = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE lower(email) = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, LedgerError> {
        let rows = sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn search_clients(&self, keyword: &str) -> Result<Vec<Client>, LedgerError> {
        let pattern = format!("%{}%", keyword.trim());
        let rows = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE name ILIKE $1 OR email ILIKE $1 OR COALESCE(address, '') ILIKE $1
            ORDER BY created_at, id
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_order(&self, order: Order) -> Result<Order, LedgerError> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, title, supplier_id, consumer_id, price,
                                started_at, finished_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.title)
        .bind(order.supplier_id)
        .bind(order.consumer_id)
        .bind(order.price)
        .bind(order.started_at)
        .bind(order.finished_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_order(&self, order: Order) -> Result<Order, LedgerError> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET title = $2, price = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.title)
        .bind(order.price)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_order_by_key(&self, key: &OrderKey) -> Result<Option<Order>, LedgerError> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE lower(title) = $1 AND supplier_id = $2 AND consumer_id = $3
            "#,
        )
        .bind(&key.title)
        .bind(key.supplier_id)
        .bind(key.consumer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_orders_by_client(&self, client_id: Uuid) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE supplier_id = $1 OR consumer_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn net_position(&self, client_id: Uuid) -> Result<Decimal, LedgerError> {
        let position: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN supplier_id = $1 THEN price ELSE 0 END), 0)
                 - COALESCE(SUM(CASE WHEN consumer_id = $1 THEN price ELSE 0 END), 0)
            FROM orders
            WHERE supplier_id = $1 OR consumer_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(position)
    }
}
