use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum StoreApiError {
    Rest(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl StoreApiError {
    /// True for 4xx responses: the request itself was rejected and resending it unchanged
    /// will fail again.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreApiError::Rest(status, _) if status.is_client_error())
    }
}

impl From<ApiError> for StoreApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, body) | ApiError::ServerError(status, body) => {
                StoreApiError::Rest(status, ErrorDetail::from_body(&body))
            }
            e => StoreApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for StoreApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreApiError::Internal(e) => write!(f, "Internal error: {}", e),
            StoreApiError::Rest(status, detail) => {
                write!(f, "({}) {}", status, detail)
            }
        }
    }
}

impl std::error::Error for StoreApiError {}

/// Error body returned by the row gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ErrorDetail {
    /// Parse a gateway error body, keeping the raw text when it is not the expected JSON shape
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            code: None,
            message: body.trim().to_string(),
            details: None,
            hint: None,
        })
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{}: ", code)?;
        }
        f.write_str(&self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}
