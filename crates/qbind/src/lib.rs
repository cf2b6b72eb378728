//! Typed queue binding and dispatch over a message broker.
//!
//! This is the "just works" layer. Implement [`Message`] for a serde type,
//! and qbind derives its queue name, declares the queue, and moves validated
//! instances between producers and consumers — no manual connection,
//! channel, or queue-naming bookkeeping.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use qbind::{Consumer, Message, MemoryTransport, Producer, QueueBinder};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Greeting {
//!     text: String,
//! }
//!
//! impl Message for Greeting {
//!     fn type_name() -> &'static str {
//!         "Greeting"
//!     }
//! }
//!
//! # fn main() -> Result<(), qbind::QueueError> {
//! let binder = Arc::new(QueueBinder::new(Arc::new(MemoryTransport::new())));
//!
//! let producer = Producer::new(Arc::clone(&binder));
//! producer.send(&Greeting { text: "hello".into() })?;
//!
//! let mut consumer = Consumer::new(binder);
//! consumer.register(|greeting: Greeting| {
//!     println!("received {greeting:?}");
//!     Ok(())
//! })?;
//! consumer.start()?; // blocks until a handle's stop()
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod producer;

pub use binding::{QueueBinder, QueueBinding};
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle};
pub use dispatcher::{DispatchOutcome, HandlerError};
pub use error::{QueueError, Result};
pub use message::{Envelope, Message, ValidationError};
pub use producer::Producer;

pub use qbind_transport::{Delivery, MemoryTransport, Subscription, Transport, TransportError};
