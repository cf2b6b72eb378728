use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use qbind_transport::Subscription;
use tracing::{debug, info, warn};

use crate::error::{QueueError, Result};
use crate::message::{from_payload, Message};

/// Error type callbacks use to report failure.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one message handling attempt; drives the ack/nack decision.
///
/// Lives only within a single dispatch cycle.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The callback handled a validated instance; the message is acked.
    Success,
    /// The payload failed deserialization or validation; the callback was
    /// never invoked and the message is nacked.
    ValidationFailure(QueueError),
    /// The callback failed on a valid instance; the message is nacked.
    CallbackFailure(HandlerError),
}

/// The `on_message` surface a dispatch loop drives.
///
/// Object-safe so registrations of different message types share one loop
/// implementation.
pub(crate) trait MessageHandler: Send {
    fn on_message(&mut self, payload: &[u8]) -> DispatchOutcome;
}

/// Wraps a plain callback with deserialization and validation.
///
/// Explicit composition: holds the raw callback and its message type, and
/// exposes the byte-level `on_message` signature the dispatch loop expects.
pub(crate) struct TypedHandler<T, F> {
    callback: F,
    #[cfg(feature = "schema")]
    schema: Option<(String, std::sync::Arc<qbind_schema::SchemaRegistry>)>,
    _message: PhantomData<fn(T)>,
}

impl<T, F> TypedHandler<T, F>
where
    T: Message,
    F: FnMut(T) -> std::result::Result<(), HandlerError> + Send,
{
    pub(crate) fn new(callback: F) -> Self {
        Self {
            callback,
            #[cfg(feature = "schema")]
            schema: None,
            _message: PhantomData,
        }
    }

    /// Also check payloads against the queue's JSON Schema before decoding.
    #[cfg(feature = "schema")]
    pub(crate) fn with_schema(
        mut self,
        queue: &str,
        registry: std::sync::Arc<qbind_schema::SchemaRegistry>,
    ) -> Self {
        self.schema = Some((queue.to_string(), registry));
        self
    }
}

impl<T, F> MessageHandler for TypedHandler<T, F>
where
    T: Message,
    F: FnMut(T) -> std::result::Result<(), HandlerError> + Send,
{
    fn on_message(&mut self, payload: &[u8]) -> DispatchOutcome {
        #[cfg(feature = "schema")]
        if let Some((queue, registry)) = &self.schema {
            if let Err(err) = registry.validate(queue, payload) {
                return DispatchOutcome::ValidationFailure(err.into());
            }
        }

        match from_payload::<T>(payload) {
            Err(err) => DispatchOutcome::ValidationFailure(err),
            Ok(instance) => match (self.callback)(instance) {
                Ok(()) => DispatchOutcome::Success,
                Err(err) => DispatchOutcome::CallbackFailure(err),
            },
        }
    }
}

/// One subscription's dispatch loop.
///
/// Per delivery: Idle until a message arrives, process it through the
/// handler, then ack on success or nack on failure — in delivery order,
/// one message at a time.
///
/// Failed messages are rejected without requeue unless `requeue_on_failure`
/// is set: requeueing a permanently malformed or permanently failing
/// message would redeliver it forever. Retry policy belongs to the
/// transport or a layer above.
///
/// Returns when the shutdown flag is observed (always after the in-flight
/// message is settled) or when the transport fails.
pub(crate) fn run_loop(
    queue: &str,
    mut subscription: Box<dyn Subscription>,
    handler: &mut dyn MessageHandler,
    poll_interval: Duration,
    requeue_on_failure: bool,
    shutdown: &AtomicBool,
) -> Result<()> {
    info!(queue, "dispatch loop started");

    while !shutdown.load(Ordering::SeqCst) {
        let Some(delivery) = subscription.receive(poll_interval)? else {
            continue;
        };

        match handler.on_message(&delivery.payload) {
            DispatchOutcome::Success => {
                debug!(queue, tag = delivery.tag, "message handled, acking");
                subscription.ack(delivery.tag)?;
            }
            DispatchOutcome::ValidationFailure(err) => {
                warn!(
                    queue,
                    tag = delivery.tag,
                    error = %err,
                    requeue = requeue_on_failure,
                    "undecodable message, nacking"
                );
                subscription.nack(delivery.tag, requeue_on_failure)?;
            }
            DispatchOutcome::CallbackFailure(err) => {
                warn!(
                    queue,
                    tag = delivery.tag,
                    error = %err,
                    requeue = requeue_on_failure,
                    "callback failed, nacking"
                );
                subscription.nack(delivery.tag, requeue_on_failure)?;
            }
        }
    }

    info!(queue, "dispatch loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    impl Message for Ping {
        fn type_name() -> &'static str {
            "Ping"
        }
    }

    fn make_handler<F>(callback: F) -> TypedHandler<Ping, F>
    where
        F: FnMut(Ping) -> std::result::Result<(), HandlerError> + Send,
    {
        TypedHandler::new(callback)
    }

    #[test]
    fn valid_payload_reaches_callback() {
        let mut seen = Vec::new();
        let mut handler = make_handler(|ping: Ping| {
            seen.push(ping.seq);
            Ok(())
        });

        let outcome = handler.on_message(br#"{"seq":7}"#);
        assert!(matches!(outcome, DispatchOutcome::Success));
        drop(handler);
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn undecodable_payload_short_circuits_callback() {
        let mut invoked = false;
        let mut handler = make_handler(|_ping: Ping| {
            invoked = true;
            Ok(())
        });

        let outcome = handler.on_message(b"garbage");
        assert!(matches!(
            outcome,
            DispatchOutcome::ValidationFailure(QueueError::Deserialize { .. })
        ));
        drop(handler);
        assert!(!invoked, "callback must not see undecodable payloads");
    }

    #[test]
    fn callback_error_maps_to_callback_failure() {
        let mut handler =
            make_handler(|_ping: Ping| Err::<(), HandlerError>("downstream unavailable".into()));

        let outcome = handler.on_message(br#"{"seq":1}"#);
        assert!(matches!(outcome, DispatchOutcome::CallbackFailure(_)));
    }

    #[cfg(feature = "schema")]
    #[test]
    fn schema_registry_rejects_before_callback() {
        use qbind_schema::SchemaRegistry;

        let registry = SchemaRegistry::from_embedded(&[(
            "Ping",
            r#"{"type":"object","properties":{"seq":{"type":"integer","minimum":10}},"required":["seq"]}"#,
        )])
        .expect("schemas should compile");

        let mut invoked = false;
        let mut handler = TypedHandler::new(|_ping: Ping| {
            invoked = true;
            Ok(())
        })
        .with_schema("Ping", std::sync::Arc::new(registry));

        // Decodes as Ping but violates the queue schema.
        let outcome = handler.on_message(br#"{"seq":1}"#);
        assert!(matches!(
            outcome,
            DispatchOutcome::ValidationFailure(QueueError::Schema(_))
        ));
        drop(handler);
        assert!(!invoked);
    }
}
