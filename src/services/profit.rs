//! Net-position calculation.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::Order;

/// Net position of a client over a set of orders: Σ price received as
/// supplier − Σ price paid as consumer.
///
/// Pure and side-effect-free; `Decimal` arithmetic is exact, so any store
/// that computes positions its own way (e.g. in SQL) must agree with this
/// function bit for bit. Tests use it as the oracle.
pub fn net_position(client_id: Uuid, orders: &[Order]) -> Decimal {
    orders.iter().fold(Decimal::ZERO, |acc, order| {
        if order.supplier_id == client_id {
            acc + order.price
        } else if order.consumer_id == client_id {
            acc - order.price
        } else {
            acc
        }
    })
}
