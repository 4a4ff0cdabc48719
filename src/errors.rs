// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Receipt analysis failed on every provider:\n{report}")]
    AnalysisExhausted { report: String },
}

/// Single provider-call failure, classified for the retry walk.
///
/// `Quota` is retried with backoff, `InvalidKey` burns the whole credential,
/// everything else just advances to the next candidate model.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("quota exhausted: {0}")]
    Quota(String),

    #[error("invalid API key: {0}")]
    InvalidKey(String),

    #[error("provider failure: {0}")]
    Provider(String),

    #[error("unparseable response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Three-way classification of a non-2xx provider response. The status
    /// code is checked first; body substrings cover providers that tunnel
    /// the real failure kind through a generic 400 payload.
    pub fn classify_http(status: StatusCode, body: &str) -> ProviderError {
        let snippet: String = body.chars().take(200).collect();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProviderError::Quota(snippet);
        }

        let lower = body.to_lowercase();
        if lower.contains("resource exhausted")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
        {
            return ProviderError::Quota(snippet);
        }
        if status == StatusCode::UNAUTHORIZED
            || lower.contains("api key")
            || lower.contains("api_key_invalid")
        {
            return ProviderError::InvalidKey(snippet);
        }

        ProviderError::Provider(format!("{status}: {snippet}"))
    }
}

impl ResponseError for ScanError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ScanError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Image processing error",
                    "message": self.to_string()
                }))
            }
            ScanError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            ScanError::AnalysisExhausted { .. } => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI analysis failed",
                    "message": self.to_string()
                }))
            }
        }
    }
}
