use thiserror::Error;

/// Failures crossing a collaborator boundary. All of these are bounded:
/// outbound calls carry a timeout, so `Unavailable` is retryable rather
/// than a hang.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator returned malformed data: {0}")]
    Malformed(String),

    #[error("Resource not found")]
    NotFound,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Unavailable("request timed out".to_string())
        } else if err.is_decode() {
            GatewayError::Malformed(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}
