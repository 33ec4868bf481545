//! ingest-middleware: message bus abstraction
//!
//! Provides the `Transport` trait with NATS and in-memory implementations.

pub mod error;
pub mod factory;
pub mod memory;
pub mod nats;
pub mod transport;

pub use error::TransportError;
pub use factory::MiddlewareFactory;
pub use memory::InMemoryTransport;
pub use nats::{subject_matches, NatsTransport, SubjectBuilder};
pub use transport::{Headers, Subscription, Transport, TransportMessage};
