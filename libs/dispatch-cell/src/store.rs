// libs/dispatch-cell/src/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{Ambulance, AmbulanceStatus, EmergencyFilter, EmergencyRequest};
use shared_gateways::GatewayError;

/// Persistence seam for emergency requests.
#[async_trait]
pub trait EmergencyStore: Send + Sync {
    async fn insert(&self, emergency: EmergencyRequest) -> Result<(), GatewayError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<EmergencyRequest>, GatewayError>;
    async fn update(&self, emergency: EmergencyRequest) -> Result<(), GatewayError>;
    async fn list(&self, filter: EmergencyFilter) -> Result<Vec<EmergencyRequest>, GatewayError>;
}

/// Capability interface onto the ambulance collaborator. The fleet owns
/// ambulance status; the dispatch engine only reads it and emits
/// reserve/release intents.
#[async_trait]
pub trait AmbulanceFleet: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<Ambulance>, GatewayError>;

    /// Available ambulances, optionally scoped to one clinic.
    async fn list_available(&self, clinic_id: Option<Uuid>) -> Result<Vec<Ambulance>, GatewayError>;

    /// Atomically claim an ambulance for dispatch: Available -> EnRoute as
    /// one compare-and-set. Returns false when the ambulance is anything
    /// but Available, however recently a candidate listing said otherwise.
    async fn try_reserve(&self, id: Uuid) -> Result<bool, GatewayError>;

    /// Return a previously claimed ambulance to the available pool.
    async fn release(&self, id: Uuid) -> Result<(), GatewayError>;

    async fn set_status(&self, id: Uuid, status: AmbulanceStatus) -> Result<(), GatewayError>;
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ==============================================================================

#[derive(Default)]
pub struct InMemoryEmergencyStore {
    records: RwLock<HashMap<Uuid, EmergencyRequest>>,
}

impl InMemoryEmergencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmergencyStore for InMemoryEmergencyStore {
    async fn insert(&self, emergency: EmergencyRequest) -> Result<(), GatewayError> {
        self.records.write().await.insert(emergency.id, emergency);
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<EmergencyRequest>, GatewayError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, emergency: EmergencyRequest) -> Result<(), GatewayError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&emergency.id) {
            return Err(GatewayError::NotFound);
        }
        records.insert(emergency.id, emergency);
        Ok(())
    }

    async fn list(&self, filter: EmergencyFilter) -> Result<Vec<EmergencyRequest>, GatewayError> {
        let records = self.records.read().await;
        let mut matching: Vec<EmergencyRequest> = records
            .values()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| filter.clinic_id.map_or(true, |id| e.clinic_id == Some(id)))
            .filter(|e| filter.patient_id.map_or(true, |id| e.patient_id == id))
            .cloned()
            .collect();

        matching.sort_by_key(|e| e.created_at);

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

/// Reference fleet. One mutex over the whole map keeps `try_reserve` a
/// genuine compare-and-set.
#[derive(Default)]
pub struct InMemoryAmbulanceFleet {
    vehicles: Mutex<HashMap<Uuid, Ambulance>>,
}

impl InMemoryAmbulanceFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, ambulance: Ambulance) {
        self.vehicles.lock().await.insert(ambulance.id, ambulance);
    }
}

#[async_trait]
impl AmbulanceFleet for InMemoryAmbulanceFleet {
    async fn fetch(&self, id: Uuid) -> Result<Option<Ambulance>, GatewayError> {
        Ok(self.vehicles.lock().await.get(&id).cloned())
    }

    async fn list_available(&self, clinic_id: Option<Uuid>) -> Result<Vec<Ambulance>, GatewayError> {
        Ok(self
            .vehicles
            .lock()
            .await
            .values()
            .filter(|a| a.status == AmbulanceStatus::Available)
            .filter(|a| clinic_id.map_or(true, |c| a.clinic_id == c))
            .cloned()
            .collect())
    }

    async fn try_reserve(&self, id: Uuid) -> Result<bool, GatewayError> {
        let mut vehicles = self.vehicles.lock().await;
        match vehicles.get_mut(&id) {
            Some(ambulance) if ambulance.status == AmbulanceStatus::Available => {
                ambulance.status = AmbulanceStatus::EnRoute;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(GatewayError::NotFound),
        }
    }

    async fn release(&self, id: Uuid) -> Result<(), GatewayError> {
        let mut vehicles = self.vehicles.lock().await;
        match vehicles.get_mut(&id) {
            Some(ambulance) => {
                ambulance.status = AmbulanceStatus::Available;
                Ok(())
            }
            None => Err(GatewayError::NotFound),
        }
    }

    async fn set_status(&self, id: Uuid, status: AmbulanceStatus) -> Result<(), GatewayError> {
        let mut vehicles = self.vehicles.lock().await;
        match vehicles.get_mut(&id) {
            Some(ambulance) => {
                ambulance.status = status;
                Ok(())
            }
            None => Err(GatewayError::NotFound),
        }
    }
}
