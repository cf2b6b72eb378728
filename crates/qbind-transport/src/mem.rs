use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Delivery, Subscription, Transport};

/// In-process broker transport.
///
/// Named FIFO queues held in memory, shared by cloning the handle. Producers
/// and consumers in the same process exchange messages through it exactly as
/// they would through a remote broker: declare, publish, subscribe, settle
/// each delivery with ack or nack.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<BrokerState>,
    arrivals: Condvar,
}

struct BrokerState {
    queues: HashMap<String, VecDeque<Bytes>>,
    next_tag: u64,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState {
                    queues: HashMap::new(),
                    next_tag: 1,
                    closed: false,
                }),
                arrivals: Condvar::new(),
            }),
        }
    }

    /// Close the broker.
    ///
    /// Wakes every blocked receiver; all further operations fail with
    /// [`TransportError::Closed`].
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        info!("memory transport closed");
        self.shared.arrivals.notify_all();
    }

    /// Number of messages currently waiting in a queue.
    pub fn queue_depth(&self, queue: &str) -> Result<usize> {
        let state = self.lock_state();
        state
            .queues
            .get(queue)
            .map(VecDeque::len)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_string()))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        // Lock poisoning only happens if a holder panicked; the queue data
        // itself is still consistent (every mutation is completed under the
        // lock), so continue with the inner state.
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn declare_queue(&self, queue: &str) -> Result<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if !state.queues.contains_key(queue) {
            debug!(queue, "declared queue");
            state.queues.insert(queue.to_string(), VecDeque::new());
        }
        Ok(())
    }

    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let messages = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_string()))?;
        messages.push_back(Bytes::copy_from_slice(payload));
        debug!(queue, bytes = payload.len(), "published message");
        self.shared.arrivals.notify_all();
        Ok(())
    }

    fn subscribe(&self, queue: &str, prefetch: u16) -> Result<Box<dyn Subscription>> {
        let state = self.lock_state();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if !state.queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }
        debug!(queue, prefetch, "opened subscription");
        Ok(Box::new(MemorySubscription {
            shared: Arc::clone(&self.shared),
            queue: queue.to_string(),
            prefetch,
            unacked: HashMap::new(),
        }))
    }
}

struct MemorySubscription {
    shared: Arc<Shared>,
    queue: String,
    prefetch: u16,
    unacked: HashMap<u64, Bytes>,
}

impl MemorySubscription {
    fn take_unacked(&mut self, tag: u64) -> Result<Bytes> {
        self.unacked
            .remove(&tag)
            .ok_or(TransportError::UnknownDelivery(tag))
    }
}

impl Subscription for MemorySubscription {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        // Settling happens through this same subscription, so the cap cannot
        // lift mid-call; still honor the timeout so callers keep a uniform
        // polling cadence whether idle or at the cap.
        let at_cap = self.prefetch > 0 && self.unacked.len() >= usize::from(self.prefetch);

        let deadline = Instant::now() + timeout;
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        loop {
            if state.closed {
                return Err(TransportError::Closed);
            }

            let messages = state
                .queues
                .get_mut(&self.queue)
                .ok_or_else(|| TransportError::UnknownQueue(self.queue.clone()))?;
            if !at_cap {
                if let Some(payload) = messages.pop_front() {
                    let tag = state.next_tag;
                    state.next_tag += 1;
                    self.unacked.insert(tag, payload.clone());
                    return Ok(Some(Delivery { tag, payload }));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let (guard, wait) = self
                .shared
                .arrivals
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
            if wait.timed_out() {
                // Re-check the queue once before giving up; a publish may
                // have raced the timeout.
                continue;
            }
        }
    }

    fn ack(&mut self, tag: u64) -> Result<()> {
        self.take_unacked(tag)?;
        debug!(queue = %self.queue, tag, "acked delivery");
        Ok(())
    }

    fn nack(&mut self, tag: u64, requeue: bool) -> Result<()> {
        let payload = self.take_unacked(tag)?;
        if requeue {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(messages) = state.queues.get_mut(&self.queue) {
                messages.push_front(payload);
                self.shared.arrivals.notify_all();
            }
            debug!(queue = %self.queue, tag, "nacked delivery, requeued");
        } else {
            debug!(queue = %self.queue, tag, "nacked delivery, dropped");
        }
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if self.unacked.is_empty() {
            return;
        }
        // A subscription dropped with un-acked deliveries returns them to
        // the queue, matching broker behavior on channel close.
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(messages) = state.queues.get_mut(&self.queue) {
            for (_, payload) in self.unacked.drain() {
                messages.push_front(payload);
            }
            self.shared.arrivals.notify_all();
        }
    }
}
