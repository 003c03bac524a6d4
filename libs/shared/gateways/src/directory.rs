use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::GatewayError;
use shared_config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffType {
    Doctor,
    Nurse,
    Paramedic,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub staff_type: StaffType,
    pub first_name: String,
    pub last_name: String,
    pub is_available: bool,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One page of the available-staff feed. The feed owns its pagination;
/// callers accumulate pages up to their own bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffPage {
    pub members: Vec<StaffMember>,
    pub page: u32,
    pub has_more: bool,
}

#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Resolve an authenticated user identity to the doctor it represents.
    async fn resolve_doctor(&self, user_id: Uuid) -> Result<Option<Uuid>, GatewayError>;

    /// One page of staff currently marked available, filtered by type.
    async fn available_staff(
        &self,
        staff_type: StaffType,
        page: u32,
        page_size: u32,
    ) -> Result<StaffPage, GatewayError>;
}

// ==============================================================================
// HTTP-BACKED DIRECTORY
// ==============================================================================

pub struct HttpStaffDirectory {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpStaffDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.staff_directory_url.clone(),
            api_key: config.staff_directory_api_key.clone(),
            timeout: Duration::from_millis(config.collaborator_timeout_ms),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Staff directory request: {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Staff directory error ({}): {}", status, body);
            return Err(GatewayError::Unavailable(format!(
                "staff directory returned {}",
                status
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl StaffDirectory for HttpStaffDirectory {
    async fn resolve_doctor(&self, user_id: Uuid) -> Result<Option<Uuid>, GatewayError> {
        #[derive(Deserialize)]
        struct Resolution {
            doctor_id: Uuid,
        }

        match self.get(&format!("/v1/staff/resolve/{}", user_id)).await {
            Ok(response) => {
                let resolution: Resolution = response.json().await?;
                Ok(Some(resolution.doctor_id))
            }
            Err(GatewayError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn available_staff(
        &self,
        staff_type: StaffType,
        page: u32,
        page_size: u32,
    ) -> Result<StaffPage, GatewayError> {
        let type_param = match staff_type {
            StaffType::Doctor => "doctor",
            StaffType::Nurse => "nurse",
            StaffType::Paramedic => "paramedic",
            StaffType::Admin => "admin",
        };
        let path = format!(
            "/v1/staff/available?type={}&page={}&page_size={}",
            type_param, page, page_size
        );

        let response = self.get(&path).await?;
        let staff_page: StaffPage = response.json().await?;
        Ok(staff_page)
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Reference implementation used by tests and by deployments without an
/// external directory service.
#[derive(Default)]
pub struct InMemoryStaffDirectory {
    members: RwLock<Vec<StaffMember>>,
    user_links: RwLock<HashMap<Uuid, Uuid>>,
}

impl InMemoryStaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, member: StaffMember) {
        self.members.write().await.push(member);
    }

    pub async fn link_user(&self, user_id: Uuid, doctor_id: Uuid) {
        self.user_links.write().await.insert(user_id, doctor_id);
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn resolve_doctor(&self, user_id: Uuid) -> Result<Option<Uuid>, GatewayError> {
        Ok(self.user_links.read().await.get(&user_id).copied())
    }

    async fn available_staff(
        &self,
        staff_type: StaffType,
        page: u32,
        page_size: u32,
    ) -> Result<StaffPage, GatewayError> {
        let members = self.members.read().await;
        let matching: Vec<StaffMember> = members
            .iter()
            .filter(|m| m.staff_type == staff_type && m.is_available)
            .cloned()
            .collect();

        let offset = (page as usize) * (page_size as usize);
        let page_members: Vec<StaffMember> = matching
            .iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();
        let has_more = offset + page_members.len() < matching.len();

        Ok(StaffPage {
            members: page_members,
            page,
            has_more,
        })
    }
}
