use thiserror::Error;

/// Failures of a single generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("text generation is not configured; check GOOGLE_* environment variables or the credential file")]
    AuthNotConfigured,
    #[error("{}", upstream_message(.status, .message))]
    Upstream { status: Option<u16>, message: String },
}

impl GenerateError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        GenerateError::Upstream {
            status,
            message: message.into(),
        }
    }
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("generation service error {}: {}", code, message),
        None => format!("generation service error: {}", message),
    }
}

/// Failures of a whole batch run. Per-document failures never abort a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("no documents to process")]
    NoInput,
}
