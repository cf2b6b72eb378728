//! Broker transport abstraction for typed queue binding.
//!
//! Provides the narrow interface the rest of qbind consumes:
//! - declare a named queue
//! - publish opaque bytes to a queue
//! - subscribe and receive deliveries with explicit ack/nack
//!
//! This is the lowest layer of qbind. The broker owns all connection and
//! channel state; everything above only calls the [`Transport`] and
//! [`Subscription`] traits defined here.
//!
//! One implementation ships with the crate: [`MemoryTransport`], an
//! in-process broker used by tests and single-process deployments. Clients
//! for real brokers implement the same traits out of tree.

pub mod error;
pub mod mem;
pub mod traits;

pub use error::{Result, TransportError};
pub use mem::MemoryTransport;
pub use traits::{Delivery, Subscription, Transport};
