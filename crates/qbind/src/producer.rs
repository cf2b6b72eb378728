use std::sync::Arc;

use tracing::debug;

use crate::binding::{QueueBinder, QueueBinding};
use crate::error::Result;
use crate::message::{to_payload, Envelope, Message};

/// Publishes validated, serialized message instances to their bound queues.
///
/// Binding happens lazily: the first send of a type binds it (declaring the
/// queue) through the shared [`QueueBinder`]. Publishing is synchronous —
/// `send` returns once the transport has accepted the publish — and never
/// retried here; retry policy belongs to the caller or the transport.
pub struct Producer {
    binder: Arc<QueueBinder>,
    #[cfg(feature = "schema")]
    schema_registry: Option<Arc<qbind_schema::SchemaRegistry>>,
}

impl Producer {
    pub fn new(binder: Arc<QueueBinder>) -> Self {
        Self {
            binder,
            #[cfg(feature = "schema")]
            schema_registry: None,
        }
    }

    /// Also check serialized payloads against each queue's JSON Schema
    /// before publishing.
    #[cfg(feature = "schema")]
    pub fn with_schema_registry(mut self, registry: Arc<qbind_schema::SchemaRegistry>) -> Self {
        self.schema_registry = Some(registry);
        self
    }

    /// Send an instance to its type's bound queue.
    pub fn send<T: Message>(&self, instance: &T) -> Result<()> {
        let binding = self.binder.bind::<T>()?;
        self.publish(&binding, instance)
    }

    /// Send an instance to an explicit queue name instead of the derived one.
    pub fn send_to<T: Message>(&self, queue: &str, instance: &T) -> Result<()> {
        let binding = self.binder.bind_as::<T>(queue)?;
        self.publish(&binding, instance)
    }

    fn publish<T: Message>(&self, binding: &QueueBinding, instance: &T) -> Result<()> {
        let envelope = Envelope {
            queue: binding.queue().to_string(),
            payload: to_payload(instance)?,
        };

        #[cfg(feature = "schema")]
        if let Some(registry) = &self.schema_registry {
            registry.validate(&envelope.queue, &envelope.payload)?;
        }

        self.binder
            .transport()
            .publish(&envelope.queue, &envelope.payload)?;
        debug!(
            type_name = binding.type_name(),
            queue = %envelope.queue,
            bytes = envelope.payload.len(),
            "sent message"
        );
        Ok(())
    }
}
