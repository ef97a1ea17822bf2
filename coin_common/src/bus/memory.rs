//! In-process message bus.
//!
//! Topics fan out to consumer groups; each group is a single multi-consumer queue, so
//! all handler threads subscribed under the same group (from any number of
//! `subscribe` calls) compete for its messages. Messages published before the first
//! group of a topic exists are kept and handed to that first group, the way `nsqd`
//! buffers a topic without channels.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{debug, info};

use crate::bus::{MessageHandler, Publisher, Subscriber, Subscription};
use crate::result::Result;

#[derive(Default)]
struct TopicState {
    groups: HashMap<String, (Sender<Vec<u8>>, Receiver<Vec<u8>>)>,
    backlog: Vec<Vec<u8>>,
}

/// Cloneable handle to a shared in-process bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting in `group`'s queue for `topic`.
    pub fn pending(&self, topic: &str, group: &str) -> Result<usize> {
        let topics = self.topics.lock()?;
        Ok(topics
            .get(topic)
            .and_then(|state| state.groups.get(group))
            .map(|(_, rx)| rx.len())
            .unwrap_or(0))
    }

    fn group_queue(&self, topic: &str, group: &str) -> Result<Receiver<Vec<u8>>> {
        let mut topics = self.topics.lock()?;
        let state = topics.entry(topic.to_string()).or_default();
        if let Some((_, rx)) = state.groups.get(group) {
            return Ok(rx.clone());
        }
        let (tx, rx) = unbounded::<Vec<u8>>();
        for body in state.backlog.drain(..) {
            let _ = tx.send(body);
        }
        state.groups.insert(group.to_string(), (tx, rx.clone()));
        info!("Memory bus: group {} created on topic {}", group, topic);
        Ok(rx)
    }
}

impl Publisher for MemoryBus {
    fn publish(&mut self, topic: &str, body: &[u8]) -> Result<()> {
        let mut topics = self.topics.lock()?;
        let state = topics.entry(topic.to_string()).or_default();
        if state.groups.is_empty() {
            state.backlog.push(body.to_vec());
            return Ok(());
        }
        for (tx, _) in state.groups.values() {
            let _ = tx.send(body.to_vec());
        }
        Ok(())
    }

    fn stop(&mut self) {
        debug!("Memory bus publisher stopped");
    }
}

impl Subscriber for MemoryBus {
    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        concurrency: usize,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>> {
        let queue = self.group_queue(topic, group)?;
        let (stop_tx, stop_rx) = unbounded::<()>();
        let mut workers = Vec::with_capacity(concurrency.max(1));

        for n in 0..concurrency.max(1) {
            let queue = queue.clone();
            let stop_rx = stop_rx.clone();
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("{}-{}-{}", topic, group, n))
                .spawn(move || {
                    loop {
                        select! {
                            recv(stop_rx) -> _ => break,
                            recv(queue) -> msg => match msg {
                                Ok(body) => handler(body.as_slice()),
                                Err(_) => break,
                            },
                        }
                    }
                })?;
            workers.push(worker);
        }

        Ok(Box::new(MemorySubscription { stop_tx, workers }))
    }
}

struct MemorySubscription {
    stop_tx: Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Subscription for MemorySubscription {
    fn stop(self: Box<Self>) {
        let MemorySubscription { stop_tx, workers } = *self;
        drop(stop_tx);
        for worker in workers {
            let _ = worker.join();
        }
    }
}
