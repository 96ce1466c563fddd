use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod ledger;
mod models;
mod scenario;
mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::ledger::{ClientLockManager, LedgerStore, MemoryLedger, PgLedger};
use crate::scenario::ScenarioRunner;
use crate::services::{
    AdmissionConfig, ClientService, DelayStrategy, NoDelay, OrderService, RandomDelay,
};

pub struct AppState {
    pub config: AppConfig,
    pub clients: Arc<ClientService>,
    pub orders: Arc<OrderService>,
    pub scenarios: Arc<ScenarioRunner>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting ledgerdesk v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let database = Database::connect(url).await?;
            tracing::info!("Database connected");
            Arc::new(PgLedger::new(database.pool.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory ledger");
            Arc::new(MemoryLedger::new())
        }
    };

    let delay: Arc<dyn DelayStrategy> = if config.admission_delay_max_ms > 0 {
        tracing::info!(
            min_ms = config.admission_delay_min_ms,
            max_ms = config.admission_delay_max_ms,
            "admission delay jitter enabled"
        );
        Arc::new(RandomDelay::from_millis(
            config.admission_delay_min_ms,
            config.admission_delay_max_ms,
        ))
    } else {
        Arc::new(NoDelay)
    };

    let locks = Arc::new(ClientLockManager::new());
    let clients = Arc::new(ClientService::new(Arc::clone(&store)));
    let orders = Arc::new(OrderService::new(
        Arc::clone(&store),
        locks,
        delay,
        AdmissionConfig {
            profit_floor: config.profit_floor,
        },
    ));
    let scenarios = Arc::new(
        ScenarioRunner::new(Arc::clone(&clients), Arc::clone(&orders))
            .with_attempt_timeout(Duration::from_secs(config.scenario_attempt_timeout_secs)),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        clients,
        orders,
        scenarios,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::routes::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "environment": state.config.environment,
    }))
}
