//! Publish/subscribe bus contracts and implementations.
//!
//! - `Publisher`: sends one message body to a topic; one attempt per call.
//! - `Subscriber`: attaches a handler to a topic under a named consumer group.
//!   Every group sees every message of the topic; subscribers sharing a group share
//!   the load. Delivery is at-least-once and the handler is always acknowledged.
//! - `memory`: in-process bus, used by tests and single-process setups.
//! - `nsq`: NSQ protocol V2 producer and consumer over TCP.
use std::sync::Arc;

use crate::result::Result;

pub mod memory;
pub mod nsq;

pub use memory::MemoryBus;
pub use nsq::{NsqProducer, NsqSubscriber};

/// Callback invoked once per delivered message body, possibly from several threads.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Sending side of the bus.
pub trait Publisher: Send {
    /// Publish one message body under `topic`.
    fn publish(&mut self, topic: &str, body: &[u8]) -> Result<()>;

    /// Release the underlying connection. Further publishes may fail.
    fn stop(&mut self);
}

/// Receiving side of the bus.
pub trait Subscriber {
    /// Start delivering `topic` messages for consumer group `group` to `handler` on
    /// `concurrency` worker threads.
    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>>;
}

/// Running subscription.
pub trait Subscription: Send {
    /// Stop delivery and wait for in-flight handler calls to finish.
    fn stop(self: Box<Self>);
}
