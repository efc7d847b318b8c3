use thiserror::Error;

/// Main error type for the planner
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Invalid itinerary: {0}")]
    InvalidItinerary(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::Http(err) => err.is_timeout() || err.is_connect(),
            PlannerError::Upstream(_) => true,
            PlannerError::RateLimit { .. } => true,
            PlannerError::Timeout(_) => true,
            _ => false,
        }
    }

    /// True for failures of an external collaborator (discovery, completion, price lookup).
    /// These are always recovered locally and never abort a request.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            PlannerError::Http(_)
                | PlannerError::Upstream(_)
                | PlannerError::Timeout(_)
                | PlannerError::RateLimit { .. }
        )
    }

    /// True when a completion response could not be parsed into the expected shape.
    pub fn is_malformed_completion(&self) -> bool {
        matches!(
            self,
            PlannerError::Validation(_) | PlannerError::Serialization(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Config(_) => "CONFIG_ERROR",
            PlannerError::Http(_) => "HTTP_ERROR",
            PlannerError::Upstream(_) => "UPSTREAM_ERROR",
            PlannerError::Serialization(_) => "SERIALIZATION_ERROR",
            PlannerError::Validation(_) => "VALIDATION_ERROR",
            PlannerError::Timeout(_) => "TIMEOUT_ERROR",
            PlannerError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            PlannerError::InvalidItinerary(_) => "INVALID_ITINERARY",
            PlannerError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }
}
