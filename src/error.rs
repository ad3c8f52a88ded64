//! Error taxonomy for the transcription pipeline.
//!
//! Every stage gets its own error type; `PipelineError` is the umbrella
//! that a job's final result surfaces, and `ErrorClass` is the stable
//! user-facing code each one maps to.

use thiserror::Error;

/// Stable, user-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    InvalidInput,
    FetchFailed,
    PrepareFailed,
    ProviderRateLimited,
    ProviderQuotaExhausted,
    ProviderAuthFailed,
    ProviderRequestInvalid,
    ProviderTransientFailed,
    Cancelled,
    Timeout,
    Internal,
}

/// The full user-visible error surface: a class, a message, and suggestions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserError {
    pub class: ErrorClass,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl UserError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("http error: status {status}")]
    HttpError { status: u16 },
    #[error("too many redirects (limit 5)")]
    TooManyRedirects,
    #[error("payload too small: {bytes} bytes (minimum 1024)")]
    InvalidPayload { bytes: usize },
}

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("extension '{0}' is not in the accepted set")]
    UnacceptedExtension(String),
    #[error("file is empty")]
    Empty,
    #[error("file is truncated: {bytes} bytes (minimum 1000)")]
    Truncated { bytes: usize },
    #[error("io error reading file: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("transcoder unavailable: tried codecs {tried:?}")]
    TranscoderUnavailable { tried: Vec<String> },
    #[error("segmentation failed: {0}")]
    SegmentationFailed(String),
    #[error("validation of a prepared artifact failed: {0}")]
    ValidationFailed(#[from] ValidateError),
    #[error("io error: {0}")]
    Io(String),
}

/// Provider-error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorClass {
    RateLimit,
    QuotaExhausted,
    AuthInvalid,
    Forbidden,
    PossibleQuotaOrNetwork,
    NetworkError,
    Fatal,
}

impl ProviderErrorClass {
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ProviderErrorClass::RateLimit
                | ProviderErrorClass::PossibleQuotaOrNetwork
                | ProviderErrorClass::NetworkError
        )
    }
}

#[derive(Debug, Error)]
#[error("{class:?}: {message}")]
pub struct SttError {
    pub class: ProviderErrorClass,
    pub message: String,
}

impl SttError {
    pub fn new(class: ProviderErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("validation failed: {0}")]
    Validate(#[from] ValidateError),
    #[error("prepare failed: {0}")]
    Prepare(#[from] PrepareError),
    #[error("transcription failed: {0}")]
    Transcribe(#[from] SttError),
    #[error("job was cancelled")]
    Cancelled,
    #[error("job exceeded its deadline")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Map to the stable user-facing taxonomy.
    pub fn to_user_error(&self) -> UserError {
        match self {
            PipelineError::InvalidInput(msg) => {
                UserError::new(ErrorClass::InvalidInput, msg.clone())
            }
            PipelineError::Fetch(e) => {
                UserError::new(ErrorClass::FetchFailed, e.to_string())
            }
            PipelineError::Validate(e) => {
                UserError::new(ErrorClass::InvalidInput, e.to_string())
            }
            PipelineError::Prepare(e) => UserError::new(ErrorClass::PrepareFailed, e.to_string())
                .with_suggestions(match e {
                    PrepareError::TranscoderUnavailable { .. } => vec![
                        "compress the audio manually before uploading (e.g. mono, 16kHz, 48kbit/s)"
                            .to_string(),
                        "split the file into shorter episodes before uploading".to_string(),
                    ],
                    _ => Vec::new(),
                }),
            PipelineError::Transcribe(e) => {
                let class = match e.class {
                    ProviderErrorClass::RateLimit => ErrorClass::ProviderRateLimited,
                    ProviderErrorClass::QuotaExhausted => ErrorClass::ProviderQuotaExhausted,
                    ProviderErrorClass::AuthInvalid => ErrorClass::ProviderAuthFailed,
                    ProviderErrorClass::Forbidden => ErrorClass::ProviderAuthFailed,
                    ProviderErrorClass::PossibleQuotaOrNetwork
                    | ProviderErrorClass::NetworkError => ErrorClass::ProviderTransientFailed,
                    ProviderErrorClass::Fatal => ErrorClass::ProviderRequestInvalid,
                };
                let suggestions = if class == ErrorClass::ProviderQuotaExhausted {
                    vec!["check your provider account usage and billing".to_string()]
                } else {
                    Vec::new()
                };
                UserError::new(class, e.message.clone()).with_suggestions(suggestions)
            }
            PipelineError::Cancelled => UserError::new(ErrorClass::Cancelled, "job was cancelled"),
            PipelineError::Timeout => {
                UserError::new(ErrorClass::Timeout, "job exceeded its deadline")
            }
            PipelineError::Internal(msg) => UserError::new(ErrorClass::Internal, msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhausted_is_not_retryable() {
        assert!(!ProviderErrorClass::QuotaExhausted.retryable());
        assert!(!ProviderErrorClass::AuthInvalid.retryable());
        assert!(!ProviderErrorClass::Forbidden.retryable());
    }

    #[test]
    fn rate_limit_and_network_are_retryable() {
        assert!(ProviderErrorClass::RateLimit.retryable());
        assert!(ProviderErrorClass::NetworkError.retryable());
        assert!(ProviderErrorClass::PossibleQuotaOrNetwork.retryable());
    }

    #[test]
    fn quota_error_surfaces_billing_suggestion() {
        let err = PipelineError::Transcribe(SttError::new(
            ProviderErrorClass::QuotaExhausted,
            "no credit remaining",
        ));
        let user_err = err.to_user_error();
        assert_eq!(user_err.class, ErrorClass::ProviderQuotaExhausted);
        assert!(!user_err.suggestions.is_empty());
    }

    #[test]
    fn transcoder_unavailable_suggests_manual_compression() {
        let err = PipelineError::Prepare(PrepareError::TranscoderUnavailable {
            tried: vec!["libmp3lame".to_string()],
        });
        let user_err = err.to_user_error();
        assert_eq!(user_err.class, ErrorClass::PrepareFailed);
        assert_eq!(user_err.suggestions.len(), 2);
    }
}
