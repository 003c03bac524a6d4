// libs/dispatch-cell/src/services/events.rs
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{DispatchEvent, EmergencyPriority, EmergencyStatus};

/// Change feed for emergency state. The engine publishes on every
/// lifecycle move; consumers subscribe instead of polling the list
/// endpoint on a timer.
pub struct DispatchEventStream {
    sender: broadcast::Sender<DispatchEvent>,
}

impl DispatchEventStream {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        emergency_id: Uuid,
        status: EmergencyStatus,
        priority: EmergencyPriority,
        at: DateTime<Utc>,
    ) {
        let event = DispatchEvent {
            emergency_id,
            status,
            priority,
            at,
        };
        // A send error just means nobody is listening right now.
        if self.sender.send(event).is_err() {
            debug!("dispatch event for {} had no subscribers", emergency_id);
        }
    }
}

impl Default for DispatchEventStream {
    fn default() -> Self {
        Self::new()
    }
}
