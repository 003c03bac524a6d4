pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use services::booking::{AppointmentService, TransitionOutcome};
pub use services::lifecycle;
pub use store::{AppointmentStore, InMemoryAppointmentStore};
