//! NSQ protocol V2 client: framing, producer and consumer.
pub mod consumer;
pub mod producer;
pub mod protocol;

pub use consumer::NsqSubscriber;
pub use producer::NsqProducer;
