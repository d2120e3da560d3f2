//! Client side of the Network UPS Tools query protocol.

pub mod client;
pub mod tcp;

pub use client::{MockUpsClient, NutError, NutFuture, UpsClient, UpsVars};
pub use tcp::NutTcpClient;
