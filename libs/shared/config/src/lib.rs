use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub staff_directory_url: String,
    pub staff_directory_api_key: String,
    /// Timeout applied to every outbound collaborator call, in milliseconds.
    pub collaborator_timeout_ms: u64,
    /// Page size used when accumulating the available-staff feed.
    pub staff_page_size: u32,
    /// Upper bound on pages pulled from the staff feed per candidate listing.
    pub max_staff_pages: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_host: env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            staff_directory_url: env::var("STAFF_DIRECTORY_URL").unwrap_or_else(|_| {
                warn!("STAFF_DIRECTORY_URL not set, using empty value");
                String::new()
            }),
            staff_directory_api_key: env::var("STAFF_DIRECTORY_API_KEY").unwrap_or_else(|_| {
                warn!("STAFF_DIRECTORY_API_KEY not set, using empty value");
                String::new()
            }),
            collaborator_timeout_ms: env::var("COLLABORATOR_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            staff_page_size: env::var("STAFF_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            max_staff_pages: env::var("MAX_STAFF_PAGES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        };

        if !config.is_staff_directory_configured() {
            warn!("Staff directory not configured - candidate listing falls back to the in-process directory");
        }

        config
    }

    pub fn is_staff_directory_configured(&self) -> bool {
        !self.staff_directory_url.is_empty() && !self.staff_directory_api_key.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 3000,
            staff_directory_url: String::new(),
            staff_directory_api_key: String::new(),
            collaborator_timeout_ms: 5_000,
            staff_page_size: 50,
            max_staff_pages: 4,
        }
    }
}
