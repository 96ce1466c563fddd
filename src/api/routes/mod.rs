use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    let client_routes = Router::new()
        .route(
            "/clients",
            post(handlers::client::create_client).get(handlers::client::list_clients),
        )
        .route("/clients/profit-range", get(handlers::client::profit_range))
        .route(
            "/clients/:id",
            get(handlers::client::get_client).put(handlers::client::update_client),
        )
        .route("/clients/:id/status", patch(handlers::client::update_status))
        .route("/clients/:id/orders", get(handlers::client::client_orders))
        .route("/clients/:id/profit", get(handlers::client::client_profit));

    let order_routes = Router::new()
        .route(
            "/orders",
            post(handlers::order::create_order).get(handlers::order::list_orders),
        )
        .route(
            "/orders/:id",
            get(handlers::order::get_order)
                .put(handlers::order::update_order)
                .delete(handlers::order::delete_order),
        );

    let scenario_routes = Router::new()
        .route("/scenarios/duplicates", post(handlers::scenario::duplicates))
        .route("/scenarios/descending", post(handlers::scenario::descending))
        .route("/scenarios/deactivation", post(handlers::scenario::deactivation));

    Router::new()
        .merge(client_routes)
        .merge(order_routes)
        .merge(scenario_routes)
}
