use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for domain events, one channel per field. The notification
/// collaborator (out of process) subscribes here; the engine only emits.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a field. Creates the channel if needed.
    pub fn subscribe(&self, field_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(field_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, field_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&field_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a field is deleted).
    pub fn remove(&self, field_id: &Ulid) {
        self.channels.remove(field_id);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
