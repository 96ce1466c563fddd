pub mod client;
pub mod order;

pub use client::*;
pub use order::*;
