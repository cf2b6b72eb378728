use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use qbind_transport::Transport;
use tracing::debug;

use crate::error::{QueueError, Result};
use crate::message::Message;

/// An immutable pairing of a message type and its queue name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    type_name: &'static str,
    queue: String,
}

impl QueueBinding {
    /// The message type this binding belongs to.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The queue this type is bound to.
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

/// Derives queue names from message types and declares the queues.
///
/// An explicit registry instance owned by the application — construct it at
/// startup, share it between producers and consumers, discard it at
/// shutdown. At most one binding exists per message type within a binder.
pub struct QueueBinder {
    transport: Arc<dyn Transport>,
    state: Mutex<BindState>,
}

#[derive(Default)]
struct BindState {
    by_type: HashMap<&'static str, QueueBinding>,
    by_queue: HashMap<String, &'static str>,
}

impl QueueBinder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(BindState::default()),
        }
    }

    /// The transport this binder declares queues on.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Bind a message type to its derived queue name.
    ///
    /// The first bind declares the queue on the transport; repeated binds
    /// for the same type return the existing binding without re-declaring.
    pub fn bind<T: Message>(&self) -> Result<QueueBinding> {
        self.bind_named(T::type_name(), None)
    }

    /// Bind a message type to an explicit queue name.
    ///
    /// Fails with [`QueueError::BindingConflict`] if the name belongs to a
    /// different type, or if this type is already bound under another name.
    pub fn bind_as<T: Message>(&self, queue: &str) -> Result<QueueBinding> {
        self.bind_named(T::type_name(), Some(queue))
    }

    /// Look up the binding for a type name, if one exists.
    pub fn binding_for(&self, type_name: &str) -> Option<QueueBinding> {
        self.lock_state().by_type.get(type_name).cloned()
    }

    fn bind_named(&self, type_name: &'static str, override_queue: Option<&str>) -> Result<QueueBinding> {
        let mut state = self.lock_state();

        if let Some(existing) = state.by_type.get(type_name) {
            return match override_queue {
                Some(queue) if queue != existing.queue => Err(QueueError::BindingConflict {
                    requested: type_name,
                    queue: queue.to_string(),
                    existing_type: existing.type_name,
                    existing_queue: existing.queue.clone(),
                }),
                _ => Ok(existing.clone()),
            };
        }

        let queue = override_queue.unwrap_or(type_name).to_string();
        if let Some(&owner) = state.by_queue.get(&queue) {
            return Err(QueueError::BindingConflict {
                requested: type_name,
                queue: queue.clone(),
                existing_type: owner,
                existing_queue: queue,
            });
        }

        self.transport.declare_queue(&queue)?;
        debug!(type_name, queue = %queue, "bound message type to queue");

        let binding = QueueBinding {
            type_name,
            queue: queue.clone(),
        };
        state.by_queue.insert(queue, type_name);
        state.by_type.insert(type_name, binding.clone());
        Ok(binding)
    }

    fn lock_state(&self) -> MutexGuard<'_, BindState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
