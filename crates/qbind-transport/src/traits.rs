use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A single message handed to a subscription, pending ack or nack.
///
/// The tag identifies the delivery within the subscription that produced it
/// and is meaningless outside that subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub payload: Bytes,
}

/// An open channel to the broker.
///
/// Implementations own all connection state. Callers never manage channels,
/// exchanges, or reconnection through this trait — they declare, publish,
/// and subscribe, nothing more.
pub trait Transport: Send + Sync {
    /// Ensure the named queue exists. Idempotent at the broker.
    fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Publish a payload to a declared queue.
    ///
    /// Returns once the transport has accepted the publish; broker-side
    /// durability is the implementation's concern.
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()>;

    /// Open a subscription on a declared queue.
    ///
    /// `prefetch` caps the number of un-acked deliveries the subscription
    /// may hold at once; `0` means unlimited.
    fn subscribe(&self, queue: &str, prefetch: u16) -> Result<Box<dyn Subscription>>;
}

/// An active subscription on one queue.
///
/// Deliveries arrive in the order the broker holds them and each must be
/// settled with [`ack`](Subscription::ack) or [`nack`](Subscription::nack).
pub trait Subscription: Send {
    /// Wait up to `timeout` for the next delivery.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing to deliver — the
    /// caller's chance to check for shutdown before waiting again.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Delivery>>;

    /// Acknowledge a delivery; the broker removes the message.
    fn ack(&mut self, tag: u64) -> Result<()>;

    /// Negatively acknowledge a delivery.
    ///
    /// With `requeue` the message returns to its queue for redelivery;
    /// without it the message is dropped.
    fn nack(&mut self, tag: u64, requeue: bool) -> Result<()>;
}
