use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::clock::ManualClock;
use shared_config::AppConfig;
use shared_models::actor::Actor;

pub struct TestConfig {
    pub staff_directory_url: String,
    pub staff_directory_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            staff_directory_url: "http://localhost:4550".to_string(),
            staff_directory_api_key: "test-directory-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            staff_directory_url: self.staff_directory_url.clone(),
            staff_directory_api_key: self.staff_directory_api_key.clone(),
            collaborator_timeout_ms: 500,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Fixed, readable reference instant for deterministic tests.
pub fn test_epoch() -> DateTime<Utc> {
    "2026-03-02T09:00:00Z".parse().unwrap()
}

pub fn clock_at_epoch() -> Arc<ManualClock> {
    Arc::new(ManualClock::at(test_epoch()))
}

/// A one-hour slot `days` days after the test epoch.
pub fn slot_after_days(days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = test_epoch() + Duration::days(days);
    (start, start + Duration::hours(1))
}

pub fn patient_actor() -> (Actor, Uuid) {
    let id = Uuid::new_v4();
    (Actor::Patient(id), id)
}

pub fn doctor_actor() -> (Actor, Uuid) {
    let id = Uuid::new_v4();
    (Actor::Doctor(id), id)
}
