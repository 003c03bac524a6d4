// libs/appointment-cell/src/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentFilter};
use shared_gateways::GatewayError;

/// Persistence seam for appointments. The storage engine, its queries and
/// pagination live behind this boundary.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<(), GatewayError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<Appointment>, GatewayError>;
    async fn update(&self, appointment: Appointment) -> Result<(), GatewayError>;
    async fn list(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, GatewayError>;
}

/// Reference implementation backing the binary and the test suite.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    records: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<(), GatewayError> {
        self.records
            .write()
            .await
            .insert(appointment.id, appointment);
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Appointment>, GatewayError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, appointment: Appointment) -> Result<(), GatewayError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&appointment.id) {
            return Err(GatewayError::NotFound);
        }
        records.insert(appointment.id, appointment);
        Ok(())
    }

    async fn list(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, GatewayError> {
        let records = self.records.read().await;
        let mut matching: Vec<Appointment> = records
            .values()
            .filter(|a| filter.patient_id.map_or(true, |id| a.patient_id == id))
            .filter(|a| filter.doctor_id.map_or(true, |id| a.doctor_id == id))
            .filter(|a| filter.clinic_id.map_or(true, |id| a.clinic_id == id))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.from_date.map_or(true, |t| a.scheduled_end > t))
            .filter(|a| filter.to_date.map_or(true, |t| a.scheduled_start < t))
            .cloned()
            .collect();

        matching.sort_by_key(|a| a.scheduled_start);

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}
