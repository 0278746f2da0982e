//! Structured errors for collector and LLM HTTP calls.
//!
//! Every remote failure is classified into an [`ErrorCode`] so the pipeline
//! can log a useful message and carry on with what it has.

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Categorized error codes for remote calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // API errors (user action may be required)
    InvalidApiKey,
    BudgetExceeded,
    RateLimited,
    ApiOverloaded,

    // Network errors
    NetworkError,
    Timeout,

    // Data errors
    ParseError,
    InvalidResponse,

    // Collector errors
    CollectorFailed,

    // Internal errors
    InternalError,
    Unknown,
}

impl ErrorCode {
    /// Returns true if this error requires user action to resolve.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, ErrorCode::InvalidApiKey | ErrorCode::BudgetExceeded)
    }

    /// Get a user-friendly message for this error code.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidApiKey => {
                "The API key or token is invalid or has been revoked. Run `llm-news config api-key set` to update it."
            }
            ErrorCode::BudgetExceeded => {
                "Your Anthropic API budget has been exceeded. Please add credits at console.anthropic.com."
            }
            ErrorCode::RateLimited => {
                "Too many requests. Try again later or reduce the number of sources."
            }
            ErrorCode::ApiOverloaded => {
                "The remote API is currently overloaded. Try again in a few minutes."
            }
            ErrorCode::NetworkError => {
                "Network error occurred. Please check your internet connection."
            }
            ErrorCode::Timeout => "The request timed out. Please try again.",
            ErrorCode::ParseError => {
                "Failed to parse the response. This is usually a temporary issue."
            }
            ErrorCode::InvalidResponse => "Received an invalid response from the API.",
            ErrorCode::CollectorFailed => {
                "A source could not be collected. The report will be missing its items."
            }
            ErrorCode::InternalError => {
                "An internal error occurred. Please try again or report this issue."
            }
            ErrorCode::Unknown => "An unknown error occurred. Please try again.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidApiKey => "invalid_api_key",
            ErrorCode::BudgetExceeded => "budget_exceeded",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::ApiOverloaded => "api_overloaded",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ParseError => "parse_error",
            ErrorCode::InvalidResponse => "invalid_response",
            ErrorCode::CollectorFailed => "collector_failed",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::Unknown => "unknown",
        }
    }
}

/// A structured error with user-friendly messaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub user_message: String,
    pub requires_user_action: bool,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: code.user_message().to_string(),
            requires_user_action: code.requires_user_action(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::Timeout
        } else if err.is_decode() {
            ErrorCode::ParseError
        } else {
            ErrorCode::NetworkError
        };
        Self::new(code, format!("HTTP request failed: {}", err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// API Error Parsing
// ============================================================================

/// Anthropic API error response structure.
#[derive(Debug, Deserialize)]
struct AnthropicApiError {
    error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

fn code_for_status(status_code: u16) -> ErrorCode {
    match status_code {
        401 | 403 => ErrorCode::InvalidApiKey,
        402 => ErrorCode::BudgetExceeded,
        429 => ErrorCode::RateLimited,
        408 | 504 => ErrorCode::Timeout,
        // 529 is Anthropic's "overloaded"
        500..=599 => ErrorCode::ApiOverloaded,
        _ => ErrorCode::Unknown,
    }
}

/// Parse an HTTP status code and response body into a structured error.
pub fn parse_api_error(status_code: u16, body: &str) -> ApiError {
    if let Ok(api_error) = serde_json::from_str::<AnthropicApiError>(body) {
        if let Some(detail) = api_error.error {
            let error_type = detail.error_type.as_deref().unwrap_or("");
            let message = detail.message.as_deref().unwrap_or(body);
            let lowered = message.to_lowercase();

            let code = match error_type {
                "authentication_error" | "permission_error" | "invalid_api_key" => {
                    ErrorCode::InvalidApiKey
                }
                "rate_limit_error" => ErrorCode::RateLimited,
                "overloaded_error" => ErrorCode::ApiOverloaded,
                "invalid_request_error" => {
                    if lowered.contains("credit")
                        || lowered.contains("budget")
                        || lowered.contains("billing")
                    {
                        ErrorCode::BudgetExceeded
                    } else {
                        ErrorCode::InvalidResponse
                    }
                }
                _ => code_for_status(status_code),
            };

            return ApiError::new(code, message).with_details(body.to_string());
        }
    }

    // Fallback to status code-based detection
    ApiError::new(
        code_for_status(status_code),
        format!("HTTP {}: {}", status_code, body),
    )
    .with_details(body.to_string())
}

/// Wrap a collector failure with the source it came from.
pub fn collector_error(source: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::new(
        ErrorCode::CollectorFailed,
        format!("[{}] collection failed: {}", source, err),
    )
}
