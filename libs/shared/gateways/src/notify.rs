use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::GatewayError;

/// Events handed to the notification collaborator. Delivery (SMS, push,
/// email) and patient-facing wording are its concern; reason texts stay
/// out of these payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    AppointmentConfirmed {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_start: DateTime<Utc>,
    },
    SlotLost {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_start: DateTime<Utc>,
    },
    EmergencyAssigned {
        emergency_id: Uuid,
        patient_id: Uuid,
        ambulance_id: Uuid,
        doctor_id: Option<Uuid>,
    },
}

/// Fire-and-forget sink. Callers spawn deliveries and log failures; a
/// failed notification never rolls back the transition that produced it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), GatewayError>;
}

/// Default sink: writes the event to the log stream.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), GatewayError> {
        info!(?event, "notification dispatched");
        Ok(())
    }
}

/// Test sink that records everything it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: RwLock<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<NotificationEvent> {
        self.delivered.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), GatewayError> {
        self.delivered.write().await.push(event);
        Ok(())
    }
}
