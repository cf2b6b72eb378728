use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::binding::{QueueBinder, QueueBinding};
use crate::dispatcher::{run_loop, HandlerError, MessageHandler, TypedHandler};
use crate::error::{QueueError, Result};
use crate::message::Message;

/// Controls consumer dispatch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// How long a dispatch loop waits for a delivery before re-checking
    /// for shutdown.
    pub poll_interval: Duration,
    /// Whether failed messages are returned to their queue. Off by default:
    /// requeueing a permanently bad message redelivers it forever.
    pub requeue_on_failure: bool,
    /// Un-acked delivery cap per subscription, forwarded to the transport.
    /// `0` means unlimited.
    pub prefetch: u16,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            requeue_on_failure: false,
            prefetch: 3,
        }
    }
}

/// Stops a running consumer from another thread.
#[derive(Clone)]
pub struct ConsumerHandle {
    shutdown: Arc<AtomicBool>,
}

impl ConsumerHandle {
    /// Ask all dispatch loops to exit.
    ///
    /// Loops observe the request between deliveries, so any in-flight
    /// message is settled before its loop exits.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Registers exactly one callback per message type and runs the dispatch
/// loops that feed them.
///
/// Registration happens before [`start`](Consumer::start), single-threaded;
/// at start each registration's queue gets its own subscription and its own
/// loop thread. Messages of one queue are handled sequentially in delivery
/// order; queues run concurrently with each other. A transport failure on
/// any loop stops the whole consumer and is returned from `start`.
pub struct Consumer {
    binder: Arc<QueueBinder>,
    config: ConsumerConfig,
    registrations: Vec<Registration>,
    shutdown: Arc<AtomicBool>,
    #[cfg(feature = "schema")]
    schema_registry: Option<Arc<qbind_schema::SchemaRegistry>>,
}

struct Registration {
    binding: QueueBinding,
    handler: Box<dyn MessageHandler>,
}

/// Flips the shutdown flag when a loop thread exits, whether it returned
/// or unwound. Siblings settle their in-flight message and exit, so
/// `start` never blocks on a consumer with a dead loop.
struct StopOnExit {
    shutdown: Arc<AtomicBool>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Consumer {
    pub fn new(binder: Arc<QueueBinder>) -> Self {
        Self::with_config(binder, ConsumerConfig::default())
    }

    pub fn with_config(binder: Arc<QueueBinder>, config: ConsumerConfig) -> Self {
        Self {
            binder,
            config,
            registrations: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            #[cfg(feature = "schema")]
            schema_registry: None,
        }
    }

    /// Also check received payloads against each queue's JSON Schema before
    /// deserialization.
    #[cfg(feature = "schema")]
    pub fn with_schema_registry(mut self, registry: Arc<qbind_schema::SchemaRegistry>) -> Self {
        self.schema_registry = Some(registry);
        self
    }

    /// Register the callback for a message type on its derived queue.
    ///
    /// Binds the type (declaring its queue) immediately. Fails with
    /// [`QueueError::DuplicateConsumer`] if the type already has a callback
    /// here — one consumer per type; the first registration stays active.
    pub fn register<T, F>(&mut self, callback: F) -> Result<()>
    where
        T: Message + 'static,
        F: FnMut(T) -> std::result::Result<(), HandlerError> + Send + 'static,
    {
        let binding = self.binder.bind::<T>()?;
        self.add_registration::<T, F>(binding, callback)
    }

    /// Register the callback for a message type on an explicit queue name.
    pub fn register_as<T, F>(&mut self, queue: &str, callback: F) -> Result<()>
    where
        T: Message + 'static,
        F: FnMut(T) -> std::result::Result<(), HandlerError> + Send + 'static,
    {
        let binding = self.binder.bind_as::<T>(queue)?;
        self.add_registration::<T, F>(binding, callback)
    }

    fn add_registration<T, F>(&mut self, binding: QueueBinding, callback: F) -> Result<()>
    where
        T: Message + 'static,
        F: FnMut(T) -> std::result::Result<(), HandlerError> + Send + 'static,
    {
        if self
            .registrations
            .iter()
            .any(|registration| registration.binding.type_name() == T::type_name())
        {
            return Err(QueueError::DuplicateConsumer(T::type_name()));
        }

        let handler = TypedHandler::<T, F>::new(callback);
        #[cfg(feature = "schema")]
        let handler = match &self.schema_registry {
            Some(registry) => handler.with_schema(binding.queue(), Arc::clone(registry)),
            None => handler,
        };

        debug!(
            type_name = T::type_name(),
            queue = binding.queue(),
            "registered consumer callback"
        );
        self.registrations.push(Registration {
            binding,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// A handle for stopping this consumer once it is running.
    pub fn handle(&self) -> ConsumerHandle {
        ConsumerHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Subscribe every registered queue and dispatch until stopped.
    ///
    /// Blocks the calling thread. Returns `Ok(())` after a clean
    /// [`ConsumerHandle::stop`], or the first loop failure otherwise.
    pub fn start(self) -> Result<()> {
        let Self {
            binder,
            config,
            registrations,
            shutdown,
            ..
        } = self;

        let mut loops: Vec<(String, thread::JoinHandle<Result<()>>)> =
            Vec::with_capacity(registrations.len());
        for registration in registrations {
            let subscription = match binder
                .transport()
                .subscribe(registration.binding.queue(), config.prefetch)
            {
                Ok(subscription) => subscription,
                Err(err) => {
                    // Wind down any loops already running before surfacing
                    // the subscribe failure.
                    shutdown.store(true, Ordering::SeqCst);
                    for (_, join_handle) in loops {
                        let _ = join_handle.join();
                    }
                    return Err(err.into());
                }
            };
            let shutdown = Arc::clone(&shutdown);
            let queue = registration.binding.queue().to_string();
            let mut handler = registration.handler;

            loops.push((
                queue.clone(),
                thread::spawn(move || {
                    let _stop_on_exit = StopOnExit {
                        shutdown: Arc::clone(&shutdown),
                    };
                    let result = run_loop(
                        &queue,
                        subscription,
                        handler.as_mut(),
                        config.poll_interval,
                        config.requeue_on_failure,
                        &shutdown,
                    );
                    if let Err(err) = &result {
                        error!(queue = %queue, error = %err, "dispatch loop failed");
                    }
                    result
                }),
            ));
        }

        let mut first_failure = None;
        for (queue, join_handle) in loops {
            match join_handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first_failure.get_or_insert(err);
                }
                Err(_) => {
                    shutdown.store(true, Ordering::SeqCst);
                    first_failure.get_or_insert(QueueError::LoopPanicked(queue));
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use qbind_transport::MemoryTransport;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct JobQueued {
        id: u64,
    }

    impl Message for JobQueued {
        fn type_name() -> &'static str {
            "JobQueued"
        }
    }

    fn make_consumer() -> (MemoryTransport, Consumer) {
        let transport = MemoryTransport::new();
        let binder = Arc::new(QueueBinder::new(Arc::new(transport.clone())));
        (transport, Consumer::new(binder))
    }

    #[test]
    fn register_binds_and_declares_queue() {
        let (transport, mut consumer) = make_consumer();

        consumer
            .register(|_job: JobQueued| Ok(()))
            .expect("register should succeed");
        assert_eq!(
            transport.queue_depth("JobQueued").expect("queue should be declared"),
            0
        );
    }

    #[test]
    fn second_registration_for_type_is_rejected() {
        let (_transport, mut consumer) = make_consumer();

        consumer
            .register(|_job: JobQueued| Ok(()))
            .expect("first register should succeed");
        let result = consumer.register(|_job: JobQueued| Ok(()));
        assert!(matches!(
            result,
            Err(QueueError::DuplicateConsumer("JobQueued"))
        ));
        assert_eq!(consumer.registrations.len(), 1);
    }

    #[test]
    fn register_as_uses_override_queue() {
        let (transport, mut consumer) = make_consumer();

        consumer
            .register_as("jobs.priority", |_job: JobQueued| Ok(()))
            .expect("register_as should succeed");
        assert_eq!(
            transport
                .queue_depth("jobs.priority")
                .expect("override queue should be declared"),
            0
        );
    }

    #[test]
    fn start_with_no_registrations_returns_immediately() {
        let (_transport, consumer) = make_consumer();
        consumer.start().expect("empty consumer should start and stop cleanly");
    }

    #[test]
    fn stop_before_start_makes_start_return_promptly() {
        let (_transport, mut consumer) = make_consumer();
        consumer
            .register(|_job: JobQueued| Ok(()))
            .expect("register should succeed");

        consumer.handle().stop();
        consumer.start().expect("stopped consumer should exit cleanly");
    }
}
