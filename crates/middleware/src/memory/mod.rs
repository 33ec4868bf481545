//! In-memory transport for tests and local runs
pub mod transport;

pub use transport::InMemoryTransport;
