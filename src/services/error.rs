//! Service-level error taxonomy.
//!
//! A closed union: every failure a caller can see is one of these
//! variants, and every business-rule rejection carries a `RejectReason`
//! so callers can handle each case exhaustively. `code()` values are
//! stable strings used on the wire and in scenario summaries.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Supplier,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Supplier => write!(f, "Supplier"),
            Role::Consumer => write!(f, "Consumer"),
        }
    }
}

/// Business-rule rejections of an order admission. Terminal; retrying the
/// same request cannot succeed until the underlying state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    SupplierInactive(Uuid),
    ConsumerInactive(Uuid),
    /// The party was deactivated at or before the processing-window
    /// finish time.
    BecameInactive(Role),
    FloorBreach {
        position_after: Decimal,
        floor: Decimal,
    },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::SupplierInactive(_) => "SUPPLIER_INACTIVE",
            RejectReason::ConsumerInactive(_) => "CONSUMER_INACTIVE",
            RejectReason::BecameInactive(_) => "BECAME_INACTIVE",
            RejectReason::FloorBreach { .. } => "FLOOR_BREACH",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::SupplierInactive(id) => write!(f, "Supplier is inactive: id={id}"),
            RejectReason::ConsumerInactive(id) => write!(f, "Consumer is inactive: id={id}"),
            RejectReason::BecameInactive(role) => {
                write!(f, "{role} became inactive during processing")
            }
            RejectReason::FloorBreach {
                position_after,
                floor,
            } => write!(
                f,
                "Consumer position {position_after} would drop below floor {floor}"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Unknown client or order id.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input; not retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// Unique-key collision (business key or email), including the benign
    /// store-level commit race.
    #[error("{0}")]
    Conflict(String),

    /// Business-rule rejection with a typed reason.
    #[error("{0}")]
    Rejected(RejectReason),

    /// Store failure; safe for the caller to retry.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ServiceError::Conflict(_) => "DUPLICATE",
            ServiceError::Rejected(reason) => reason.code(),
            ServiceError::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateOrderKey => ServiceError::Conflict(
                "Order with the same title/supplier/consumer already exists".to_string(),
            ),
            LedgerError::DuplicateEmail => {
                ServiceError::Conflict("Email already exists".to_string())
            }
            LedgerError::Unavailable(message) => ServiceError::Unavailable(message),
        }
    }
}
