pub mod clients;
pub mod delay;
pub mod error;
pub mod orders;
pub mod profit;

pub use clients::ClientService;
pub use delay::{DelayStrategy, FixedDelay, NoDelay, RandomDelay};
pub use error::{RejectReason, Role, ServiceError};
pub use orders::{AdmissionConfig, OrderService};
