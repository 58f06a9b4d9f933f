//! `publish`/`subscribe` primitives (spec §4.1). The event bus (C8) is
//! built on top of these rather than duplicating fan-out logic.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: String);
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Subscribes to a channel, returning a receiver of raw payloads.
    /// Spec's `subscribe(patterns, handler)` is modelled here as one
    /// channel per call; callers that need pattern-matching subscribe to
    /// each concrete channel name they care about.
    async fn subscribe(&self, channel: &str) -> broadcast::Receiver<String>;
}

/// In-memory pub/sub: one `broadcast` channel per topic, created lazily.
/// A real deployment backs this with Redis pub/sub or NATS behind the
/// same two traits.
pub struct MemoryBus {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, channel: &str, payload: String) {
        // No subscribers is not an error; spec treats publish as fire and
        // forget from the caller's perspective.
        let _ = self.sender_for(channel).send(payload);
    }
}

#[async_trait]
impl Subscriber for MemoryBus {
    async fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender_for(channel).subscribe()
    }
}

/// Convenience wrapper letting a single struct hand out both halves of
/// the bus, mirroring how `Services` wires one shared instance to many
/// consumers (see the teacher's `services/mod.rs`).
#[derive(Clone)]
pub struct SharedBus(pub Arc<MemoryBus>);

impl SharedBus {
    pub fn new() -> Self {
        SharedBus(Arc::new(MemoryBus::new()))
    }
}

impl Default for SharedBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_payload() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe("queue.update").await;
        bus.publish("queue.update", "hello".to_string()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received, "hello");
    }
}
