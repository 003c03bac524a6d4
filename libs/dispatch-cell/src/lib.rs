pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use services::assignment::DispatchEngine;
pub use services::events::DispatchEventStream;
pub use services::triage;
pub use store::{
    AmbulanceFleet, EmergencyStore, InMemoryAmbulanceFleet, InMemoryEmergencyStore,
};
