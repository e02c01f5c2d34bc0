//! Backend traits. Implementations live in `ragdesk-providers`; tests supply
//! their own fakes.

pub mod embedder;
pub mod provider;

pub use embedder::Embedder;
pub use provider::{GenerateParams, Provider};
