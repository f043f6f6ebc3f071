//! Remote calendar access.

pub mod gateway;
pub mod protocol;
pub mod provider;

pub use gateway::RemoteGateway;
pub use provider::{Provider, ProviderGateway};
