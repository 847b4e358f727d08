//! Generation coordination, fact persistence, and host session wiring.
//!
//! The engine is the assembly point of the pipeline: a [`Session`] binds
//! the host's data providers and backends together, the [`Coordinator`]
//! runs individual generations with duplicate suppression, and the
//! [`FactStore`] keeps results across host restarts.

pub mod coordinator;
pub mod session;
pub mod store;

pub use coordinator::Coordinator;
pub use session::{HostBindings, Session};
pub use store::FactStore;
