//! Order admission protocol.
//!
//! `create` is the concurrency-sensitive path: validate → snapshot status
//! check → processing window → ordered pair locking → locked
//! re-validation (status staleness, consumer floor, duplicate key) →
//! atomic commit. Admissions touching disjoint client pairs never
//! contend; admissions sharing a client serialize on the pair lock only
//! for the short locked section, not for the processing window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use super::delay::DelayStrategy;
use super::error::{RejectReason, Role, ServiceError};
use crate::ledger::{ClientLockManager, LedgerError, LedgerStore};
use crate::models::{Client, CreateOrderRequest, Order, OrderKey, UpdateOrderRequest};

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Minimum permitted net position after any committed order.
    pub profit_floor: Decimal,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            profit_floor: Decimal::from(-1000),
        }
    }
}

pub struct OrderService {
    store: Arc<dyn LedgerStore>,
    locks: Arc<ClientLockManager>,
    delay: Arc<dyn DelayStrategy>,
    config: AdmissionConfig,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        locks: Arc<ClientLockManager>,
        delay: Arc<dyn DelayStrategy>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            store,
            locks,
            delay,
            config,
        }
    }

    /// Admit a new order or reject it with a typed reason. No partial
    /// state is ever committed.
    pub async fn create(&self, request: CreateOrderRequest) -> Result<Order, ServiceError> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Order title must not be blank".to_string(),
            ));
        }
        if request.supplier_id == request.consumer_id {
            return Err(ServiceError::InvalidArgument(
                "Supplier and consumer must be different".to_string(),
            ));
        }
        if request.price < Decimal::ONE {
            return Err(ServiceError::InvalidArgument(
                "Price must be positive and >= 1".to_string(),
            ));
        }

        let supplier = self.require_client(request.supplier_id, "Supplier").await?;
        let consumer = self.require_client(request.consumer_id, "Consumer").await?;
        if !supplier.active {
            return Err(ServiceError::Rejected(RejectReason::SupplierInactive(
                supplier.id,
            )));
        }
        if !consumer.active {
            return Err(ServiceError::Rejected(RejectReason::ConsumerInactive(
                consumer.id,
            )));
        }

        // Processing window. Status changes landing in here pass the
        // snapshot check above but are caught by the locked
        // re-validation against `finished` below.
        let started = Utc::now();
        self.delay.pause().await;
        let finished = Utc::now();

        // Both locks, ascending-id order; released on every exit path.
        let _locks = self
            .locks
            .lock_pair(request.supplier_id, request.consumer_id)
            .await;

        let supplier = self.require_client(request.supplier_id, "Supplier").await?;
        let consumer = self.require_client(request.consumer_id, "Consumer").await?;
        Self::ensure_still_active(&supplier, finished, Role::Supplier)?;
        Self::ensure_still_active(&consumer, finished, Role::Consumer)?;

        let position = self.store.net_position(consumer.id).await?;
        let position_after = position - request.price;
        if position_after < self.config.profit_floor {
            debug!(
                consumer = %consumer.id,
                %position_after,
                floor = %self.config.profit_floor,
                "admission rejected: floor breach"
            );
            return Err(ServiceError::Rejected(RejectReason::FloorBreach {
                position_after,
                floor: self.config.profit_floor,
            }));
        }

        let key = OrderKey::new(&title, supplier.id, consumer.id);
        if self.store.find_order_by_key(&key).await?.is_some() {
            return Err(duplicate_order());
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            title,
            supplier_id: supplier.id,
            consumer_id: consumer.id,
            price: request.price,
            started_at: started,
            finished_at: finished,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_order(order).await {
            Ok(committed) => {
                info!(
                    order_id = %committed.id,
                    supplier = %committed.supplier_id,
                    consumer = %committed.consumer_id,
                    price = %committed.price,
                    "order admitted"
                );
                Ok(committed)
            }
            // Benign race: another committer with the same business key
            // passed its own window first.
            Err(LedgerError::DuplicateOrderKey) => Err(duplicate_order()),
            Err(other) => Err(other.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: id={id}")))
    }

    pub async fn list(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.list_orders().await?)
    }

    pub async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.list_orders_by_client(client_id).await?)
    }

    /// Title/price correction under the same duplicate-key check as
    /// admission. Supplier, consumer and the processing window are
    /// immutable.
    pub async fn update(&self, id: Uuid, request: UpdateOrderRequest) -> Result<Order, ServiceError> {
        let mut order = self.get(id).await?;

        if request.price < Decimal::ONE {
            return Err(ServiceError::InvalidArgument(
                "Price must be positive and >= 1".to_string(),
            ));
        }
        let new_title = request.title.trim();
        if new_title.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Order title must not be blank".to_string(),
            ));
        }

        if order.title.to_lowercase() != new_title.to_lowercase() {
            let key = OrderKey::new(new_title, order.supplier_id, order.consumer_id);
            if self.store.find_order_by_key(&key).await?.is_some() {
                return Err(duplicate_order());
            }
            order.title = new_title.to_string();
        }
        order.price = request.price;
        order.updated_at = Utc::now();

        match self.store.update_order(order).await {
            Ok(updated) => Ok(updated),
            Err(LedgerError::DuplicateOrderKey) => Err(duplicate_order()),
            Err(other) => Err(other.into()),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_order(id).await? {
            return Err(ServiceError::NotFound(format!("Order not found: id={id}")));
        }
        Ok(())
    }

    async fn require_client(&self, id: Uuid, role: &str) -> Result<Client, ServiceError> {
        self.store
            .get_client(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{role} not found: id={id}")))
    }

    /// Locked staleness check: the client must be active, and must not
    /// have been deactivated at or before the window finish time. A
    /// deactivate/reactivate pair inside the window clears the timestamp
    /// and passes.
    fn ensure_still_active(
        client: &Client,
        finished: DateTime<Utc>,
        role: Role,
    ) -> Result<(), ServiceError> {
        let stale = client
            .deactivated_at
            .map_or(false, |deactivated| finished >= deactivated);
        if !client.active || stale {
            return Err(ServiceError::Rejected(RejectReason::BecameInactive(role)));
        }
        Ok(())
    }
}

fn duplicate_order() -> ServiceError {
    ServiceError::Conflict("Order with the same title/supplier/consumer already exists".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::models::CreateClientRequest;
    use crate::services::clients::ClientService;
    use crate::services::delay::NoDelay;
    use crate::services::profit;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Semaphore;

    struct Fixture {
        store: Arc<MemoryLedger>,
        clients: ClientService,
        orders: OrderService,
    }

    fn fixture_with_delay(delay: Arc<dyn DelayStrategy>) -> Fixture {
        let store = Arc::new(MemoryLedger::new());
        let locks = Arc::new(ClientLockManager::new());
        Fixture {
            store: Arc::clone(&store),
            clients: ClientService::new(store.clone() as Arc<dyn LedgerStore>),
            orders: OrderService::new(
                store as Arc<dyn LedgerStore>,
                locks,
                delay,
                AdmissionConfig::default(),
            ),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_delay(Arc::new(NoDelay))
    }

    async fn pair(fx: &Fixture) -> (Uuid, Uuid) {
        let supplier = fx
            .clients
            .create(CreateClientRequest {
                name: "Supplier".into(),
                email: format!("supp-{}@mail.test", Uuid::new_v4()),
                address: None,
            })
            .await
            .unwrap();
        let consumer = fx
            .clients
            .create(CreateClientRequest {
                name: "Consumer".into(),
                email: format!("cons-{}@mail.test", Uuid::new_v4()),
                address: None,
            })
            .await
            .unwrap();
        (supplier.id, consumer.id)
    }

    fn order_request(title: &str, supplier: Uuid, consumer: Uuid, price: Decimal) -> CreateOrderRequest {
        CreateOrderRequest {
            title: title.to_string(),
            supplier_id: supplier,
            consumer_id: consumer,
            price,
        }
    }

    #[tokio::test]
    async fn preconditions_fail_without_touching_state() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        let same = fx
            .orders
            .create(order_request("t", supplier, supplier, dec!(5)))
            .await
            .unwrap_err();
        assert_eq!(same.code(), "INVALID_ARGUMENT");

        let cheap = fx
            .orders
            .create(order_request("t", supplier, consumer, dec!(0.5)))
            .await
            .unwrap_err();
        assert_eq!(cheap.code(), "INVALID_ARGUMENT");

        let blank = fx
            .orders
            .create(order_request("   ", supplier, consumer, dec!(5)))
            .await
            .unwrap_err();
        assert_eq!(blank.code(), "INVALID_ARGUMENT");

        assert!(fx.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_parties_are_not_found() {
        let fx = fixture();
        let (supplier, _) = pair(&fx).await;
        let err = fx
            .orders
            .create(order_request("t", supplier, Uuid::new_v4(), dec!(5)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn inactive_party_is_rejected_before_the_window() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;
        fx.clients.set_active(consumer, false).await.unwrap();

        let err = fx
            .orders
            .create(order_request("t", supplier, consumer, dec!(5)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONSUMER_INACTIVE");
    }

    #[tokio::test]
    async fn successful_admission_moves_both_positions() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        let order = fx
            .orders
            .create(order_request("  Widgets  ", supplier, consumer, dec!(120)))
            .await
            .unwrap();
        assert_eq!(order.title, "Widgets");
        assert!(order.started_at <= order.finished_at);

        assert_eq!(fx.store.net_position(supplier).await.unwrap(), dec!(120));
        assert_eq!(fx.store.net_position(consumer).await.unwrap(), dec!(-120));
    }

    #[tokio::test]
    async fn floor_is_inclusive_and_enforced() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        // Exactly at the floor: admitted.
        fx.orders
            .create(order_request("big", supplier, consumer, dec!(1000)))
            .await
            .unwrap();
        assert_eq!(fx.store.net_position(consumer).await.unwrap(), dec!(-1000));

        // One more unit would cross it.
        let err = fx
            .orders
            .create(order_request("small", supplier, consumer, dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FLOOR_BREACH");
        assert_eq!(fx.store.net_position(consumer).await.unwrap(), dec!(-1000));
    }

    #[tokio::test]
    async fn duplicate_key_is_case_insensitive() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        fx.orders
            .create(order_request("Widgets", supplier, consumer, dec!(5)))
            .await
            .unwrap();
        let err = fx
            .orders
            .create(order_request("  widgets ", supplier, consumer, dec!(7)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");

        // Swapped roles form a different key.
        fx.orders
            .create(order_request("Widgets", consumer, supplier, dec!(5)))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_admit_exactly_one() {
        let fx = Arc::new(fixture());
        let (supplier, consumer) = pair(&fx).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let fx = Arc::clone(&fx);
            handles.push(tokio::spawn(async move {
                fx.orders
                    .create(order_request("contested", supplier, consumer, dec!(1)))
                    .await
            }));
        }

        let mut ok = 0;
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if e.code() == "DUPLICATE" => dup += 1,
                Err(other) => panic!("unexpected rejection: {other}"),
            }
        }
        assert_eq!((ok, dup), (1, 7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn swapped_role_admissions_both_complete() {
        let fx = Arc::new(fixture());
        let (a, b) = pair(&fx).await;

        let forward = {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move { fx.orders.create(order_request("fwd", a, b, dec!(10))).await })
        };
        let reverse = {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move { fx.orders.create(order_request("rev", b, a, dec!(10))).await })
        };

        let both = async { (forward.await.unwrap(), reverse.await.unwrap()) };
        let (fwd, rev) = tokio::time::timeout(std::time::Duration::from_secs(10), both)
            .await
            .expect("deadlock between swapped-role admissions");
        fwd.unwrap();
        rev.unwrap();
    }

    /// Delay strategy that parks the admission inside its processing
    /// window until the test releases it.
    struct GatedDelay {
        gate: Semaphore,
    }

    #[async_trait]
    impl DelayStrategy for GatedDelay {
        async fn pause(&self) {
            let _permit = self.gate.acquire().await.expect("gate closed");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn deactivation_inside_the_window_invalidates_the_order() {
        let gate = Arc::new(GatedDelay {
            gate: Semaphore::new(0),
        });
        let fx = Arc::new(fixture_with_delay(gate.clone()));
        let (supplier, consumer) = pair(&fx).await;

        let admission = {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.orders
                    .create(order_request("in-flight", supplier, consumer, dec!(5)))
                    .await
            })
        };

        // Let the admission pass its snapshot check and park in the
        // window, then pull the consumer out from under it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        fx.clients.set_active(consumer, false).await.unwrap();
        gate.gate.add_permits(1);

        let err = admission.await.unwrap().unwrap_err();
        assert_eq!(err.code(), "BECAME_INACTIVE");
        assert!(fx.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reactivation_inside_the_window_clears_the_staleness() {
        let gate = Arc::new(GatedDelay {
            gate: Semaphore::new(0),
        });
        let fx = Arc::new(fixture_with_delay(gate.clone()));
        let (supplier, consumer) = pair(&fx).await;

        let admission = {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.orders
                    .create(order_request("in-flight", supplier, consumer, dec!(5)))
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        fx.clients.set_active(consumer, false).await.unwrap();
        fx.clients.set_active(consumer, true).await.unwrap();
        gate.gate.add_permits(1);

        admission.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn update_corrects_title_under_the_duplicate_check() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        let first = fx
            .orders
            .create(order_request("first", supplier, consumer, dec!(5)))
            .await
            .unwrap();
        fx.orders
            .create(order_request("second", supplier, consumer, dec!(5)))
            .await
            .unwrap();

        let err = fx
            .orders
            .update(
                first.id,
                UpdateOrderRequest {
                    title: "SECOND".into(),
                    price: dec!(5),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");

        // Same title in a different case is not a retitle.
        let repriced = fx
            .orders
            .update(
                first.id,
                UpdateOrderRequest {
                    title: "FIRST".into(),
                    price: dec!(9),
                },
            )
            .await
            .unwrap();
        assert_eq!(repriced.title, "first");
        assert_eq!(repriced.price, dec!(9));
    }

    #[tokio::test]
    async fn delete_removes_the_order_and_frees_its_key() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        let order = fx
            .orders
            .create(order_request("once", supplier, consumer, dec!(5)))
            .await
            .unwrap();
        fx.orders.delete(order.id).await.unwrap();
        assert_eq!(
            fx.orders.delete(order.id).await.unwrap_err().code(),
            "NOT_FOUND"
        );

        fx.orders
            .create(order_request("once", supplier, consumer, dec!(5)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn committed_positions_match_the_pure_oracle() {
        let fx = fixture();
        let (supplier, consumer) = pair(&fx).await;

        for (title, price) in [("a", dec!(100)), ("b", dec!(250)), ("c", dec!(1))] {
            fx.orders
                .create(order_request(title, supplier, consumer, price))
                .await
                .unwrap();
        }

        let orders = fx.orders.list_by_client(consumer).await.unwrap();
        assert_eq!(
            fx.store.net_position(consumer).await.unwrap(),
            profit::net_position(consumer, &orders)
        );
    }
}
