//! Scenario drivers.
//!
//! Every driver provisions a fresh supplier/consumer pair, releases all
//! workers through one `Barrier` so they contend for real, and waits for
//! each attempt with a bounded timeout. A timeout or panic becomes a
//! harness-level failure, kept distinct from a protocol rejection; a
//! timed-out admission is left to run to its terminal result on its own.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Barrier;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::{ScenarioAttempt, ScenarioSummary};
use crate::models::{Client, CreateClientRequest, CreateOrderRequest, Order};
use crate::services::{ClientService, OrderService, ServiceError};

/// What a worker task produced, before it is folded into an attempt.
enum TaskOutput {
    Order(Order),
    Deactivated,
}

pub struct ScenarioRunner {
    clients: Arc<ClientService>,
    orders: Arc<OrderService>,
    attempt_timeout: Duration,
}

impl ScenarioRunner {
    pub fn new(clients: Arc<ClientService>, orders: Arc<OrderService>) -> Self {
        Self {
            clients,
            orders,
            attempt_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// N identical (title, supplier, consumer, price=1) attempts.
    /// Expected: exactly one success, N−1 duplicate rejections.
    pub async fn duplicates(&self, n: usize) -> Result<ScenarioSummary, ServiceError> {
        let (supplier, consumer) = self.fresh_pair().await?;
        let title = format!("dup-{}", Uuid::new_v4().simple());
        info!(n, %title, "running duplicates scenario");

        let gate = Arc::new(Barrier::new(n));
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            let orders = Arc::clone(&self.orders);
            let gate = Arc::clone(&gate);
            let request = CreateOrderRequest {
                title: title.clone(),
                supplier_id: supplier.id,
                consumer_id: consumer.id,
                price: Decimal::ONE,
            };
            handles.push(tokio::spawn(async move {
                gate.wait().await;
                orders.create(request).await.map(TaskOutput::Order)
            }));
        }

        let attempts = self.collect(handles).await;
        Ok(summarize("duplicates", n, attempts))
    }

    /// A seed order of 970 consumes most of the headroom above the
    /// floor, then up to N attempts with prices 100, 90, … 10 under one
    /// shared title. The duplicate rule dominates: one winner, and only
    /// an attempt whose price fits the remaining headroom can be it.
    pub async fn descending(&self, n: usize) -> Result<ScenarioSummary, ServiceError> {
        let (supplier, consumer) = self.fresh_pair().await?;
        self.orders
            .create(CreateOrderRequest {
                title: format!("seed-{}", Uuid::new_v4().simple()),
                supplier_id: supplier.id,
                consumer_id: consumer.id,
                price: Decimal::from(970),
            })
            .await?;

        let shared_title = format!("dec-common-{}", Uuid::new_v4().simple());
        let mut prices = Vec::new();
        let mut price = 100;
        while price >= 10 && prices.len() < n {
            prices.push(Decimal::from(price));
            price -= 10;
        }
        info!(attempts = prices.len(), %shared_title, "running descending scenario");

        let gate = Arc::new(Barrier::new(prices.len()));
        let mut handles = Vec::with_capacity(prices.len());
        for price in &prices {
            let orders = Arc::clone(&self.orders);
            let gate = Arc::clone(&gate);
            let request = CreateOrderRequest {
                title: shared_title.clone(),
                supplier_id: supplier.id,
                consumer_id: consumer.id,
                price: *price,
            };
            handles.push(tokio::spawn(async move {
                gate.wait().await;
                orders.create(request).await.map(TaskOutput::Order)
            }));
        }

        let requested = prices.len();
        let attempts = self.collect(handles).await;
        Ok(summarize("descending", requested, attempts))
    }

    /// N distinct-title attempts racing one deactivation of the consumer
    /// fired after `deactivate_after`. The deactivation's own outcome is
    /// appended as attempt index N; the summary counts order attempts
    /// only.
    pub async fn deactivation_race(
        &self,
        n: usize,
        deactivate_after: Duration,
    ) -> Result<ScenarioSummary, ServiceError> {
        let (supplier, consumer) = self.fresh_pair().await?;
        let run = Uuid::new_v4().simple().to_string();
        info!(n, ?deactivate_after, "running deactivation-race scenario");

        let gate = Arc::new(Barrier::new(n + 1));
        let mut handles = Vec::with_capacity(n + 1);
        for index in 0..n {
            let orders = Arc::clone(&self.orders);
            let gate = Arc::clone(&gate);
            let request = CreateOrderRequest {
                title: format!("race-{run}-{index}"),
                supplier_id: supplier.id,
                consumer_id: consumer.id,
                price: Decimal::from(50),
            };
            handles.push(tokio::spawn(async move {
                gate.wait().await;
                orders.create(request).await.map(TaskOutput::Order)
            }));
        }

        let clients = Arc::clone(&self.clients);
        let consumer_id = consumer.id;
        let gate_for_deactivation = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            gate_for_deactivation.wait().await;
            tokio::time::sleep(deactivate_after).await;
            clients
                .set_active(consumer_id, false)
                .await
                .map(|_| TaskOutput::Deactivated)
        }));

        let attempts = self.collect(handles).await;
        Ok(summarize("deactivation_race", n, attempts))
    }

    async fn fresh_pair(&self) -> Result<(Client, Client), ServiceError> {
        let run = Uuid::new_v4().simple().to_string();
        let supplier = self
            .clients
            .create(CreateClientRequest {
                name: format!("Supp-{run}"),
                email: format!("supp-{run}@mail.test"),
                address: None,
            })
            .await?;
        let consumer = self
            .clients
            .create(CreateClientRequest {
                name: format!("Cons-{run}"),
                email: format!("cons-{run}@mail.test"),
                address: None,
            })
            .await?;
        Ok((supplier, consumer))
    }

    /// Await every handle in spawn order, bounding each wait. Results
    /// come back in index order regardless of completion order.
    async fn collect(
        &self,
        handles: Vec<JoinHandle<Result<TaskOutput, ServiceError>>>,
    ) -> Vec<ScenarioAttempt> {
        let mut attempts = Vec::with_capacity(handles.len());
        for (index, mut handle) in handles.into_iter().enumerate() {
            let attempt = match tokio::time::timeout(self.attempt_timeout, &mut handle).await {
                Ok(Ok(Ok(TaskOutput::Order(order)))) => ScenarioAttempt {
                    index,
                    success: true,
                    code: None,
                    order_id: Some(order.id),
                    message: "created".to_string(),
                },
                Ok(Ok(Ok(TaskOutput::Deactivated))) => ScenarioAttempt {
                    index,
                    success: true,
                    code: None,
                    order_id: None,
                    message: "consumer deactivated".to_string(),
                },
                Ok(Ok(Err(rejection))) => ScenarioAttempt {
                    index,
                    success: false,
                    code: Some(rejection.code().to_string()),
                    order_id: None,
                    message: rejection.to_string(),
                },
                Ok(Err(join_error)) => ScenarioAttempt {
                    index,
                    success: false,
                    code: Some("HARNESS_PANIC".to_string()),
                    order_id: None,
                    message: join_error.to_string(),
                },
                // The admission is not cancelled; it runs to its terminal
                // result without us.
                Err(_) => ScenarioAttempt {
                    index,
                    success: false,
                    code: Some("HARNESS_TIMEOUT".to_string()),
                    order_id: None,
                    message: format!("attempt did not resolve within {:?}", self.attempt_timeout),
                },
            };
            attempts.push(attempt);
        }
        attempts
    }
}

/// Counts cover attempt indices below `requested`; the deactivation step
/// of the race scenario sits at index `requested` and is excluded.
fn summarize(scenario: &str, requested: usize, attempts: Vec<ScenarioAttempt>) -> ScenarioSummary {
    let succeeded = attempts
        .iter()
        .filter(|a| a.index < requested && a.success)
        .count();
    let failed = attempts
        .iter()
        .filter(|a| a.index < requested && !a.success)
        .count();
    ScenarioSummary {
        scenario: scenario.to_string(),
        requested,
        succeeded,
        failed,
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientLockManager, LedgerStore, MemoryLedger};
    use crate::services::{AdmissionConfig, DelayStrategy, FixedDelay, NoDelay, OrderService};
    use rust_decimal_macros::dec;

    fn harness(delay: Arc<dyn DelayStrategy>) -> (Arc<MemoryLedger>, ScenarioRunner) {
        let store = Arc::new(MemoryLedger::new());
        let locks = Arc::new(ClientLockManager::new());
        let clients = Arc::new(ClientService::new(store.clone() as Arc<dyn LedgerStore>));
        let orders = Arc::new(OrderService::new(
            store.clone() as Arc<dyn LedgerStore>,
            locks,
            delay,
            AdmissionConfig::default(),
        ));
        (store, ScenarioRunner::new(clients, orders))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn duplicates_admit_exactly_one() {
        let (_, runner) = harness(Arc::new(NoDelay));
        let summary = runner.duplicates(10).await.unwrap();

        assert_eq!(summary.requested, 10);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 9);
        for (i, attempt) in summary.attempts.iter().enumerate() {
            assert_eq!(attempt.index, i);
            if !attempt.success {
                assert_eq!(attempt.code.as_deref(), Some("DUPLICATE"));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn descending_has_one_winner_inside_the_headroom() {
        let (store, runner) = harness(Arc::new(NoDelay));
        let summary = runner.descending(10).await.unwrap();

        assert_eq!(summary.requested, 10);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 9);

        let winner = summary.attempts.iter().find(|a| a.success).unwrap();
        let order = store
            .get_order(winner.order_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        // Headroom after the 970 seed is 30; only 30/20/10 can commit,
        // and the reported index must be the winner's price slot.
        assert!(order.price <= dec!(30), "winner {} breaches floor", order.price);
        assert_eq!(Decimal::from(100 - 10 * winner.index as i64), order.price);

        let position = store.net_position(order.consumer_id).await.unwrap();
        assert!(position >= dec!(-1000), "consumer below floor: {position}");

        for attempt in summary.attempts.iter().filter(|a| !a.success) {
            let code = attempt.code.as_deref().unwrap();
            assert!(
                code == "DUPLICATE" || code == "FLOOR_BREACH",
                "unexpected code {code}"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn deactivation_inside_every_window_fails_every_order() {
        // Wide windows, deactivation shortly after the gate opens: every
        // attempt passes its snapshot check and is then invalidated.
        let (store, runner) = harness(Arc::new(FixedDelay(Duration::from_millis(500))));
        let summary = runner
            .deactivation_race(6, Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(summary.requested, 6);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 6);
        for attempt in summary.attempts.iter().filter(|a| a.index < 6) {
            assert_eq!(attempt.code.as_deref(), Some("BECAME_INACTIVE"));
        }
        // The deactivation step itself succeeded, as attempt index n.
        assert!(summary.attempts[6].success);
        assert_eq!(summary.attempts[6].message, "consumer deactivated");

        assert!(store.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn deactivation_after_all_windows_fails_no_order() {
        let (store, runner) = harness(Arc::new(NoDelay));
        let summary = runner
            .deactivation_race(5, Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.failed, 0);

        // No committed order finished at or after the recorded
        // deactivation timestamp.
        let order_id = summary.attempts[0].order_id.unwrap();
        let consumer_id = store
            .get_order(order_id)
            .await
            .unwrap()
            .unwrap()
            .consumer_id;
        let deactivated_at = store
            .get_client(consumer_id)
            .await
            .unwrap()
            .unwrap()
            .deactivated_at
            .expect("consumer was deactivated");
        for order in store.list_orders_by_client(consumer_id).await.unwrap() {
            assert!(order.finished_at < deactivated_at);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn unresolved_attempts_become_harness_failures() {
        let (_, runner) = harness(Arc::new(FixedDelay(Duration::from_millis(500))));
        let runner = runner.with_attempt_timeout(Duration::from_millis(20));
        let summary = runner.duplicates(3).await.unwrap();

        assert_eq!(summary.succeeded, 0);
        for attempt in &summary.attempts {
            assert_eq!(attempt.code.as_deref(), Some("HARNESS_TIMEOUT"));
        }
    }
}
