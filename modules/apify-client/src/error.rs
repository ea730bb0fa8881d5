use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Run failed with status: {0}")]
    RunFailed(String),

    #[error("Run {run_id} still unfinished after {waited_secs}s")]
    RunTimedOut { run_id: String, waited_secs: u64 },
}

impl ApifyError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApifyError::Api { status: 429, .. })
    }

    /// Errors worth retrying after a pause: rate limits, 5xx, and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            ApifyError::Network(_) => true,
            ApifyError::Api { status, .. } => *status == 429 || *status >= 500,
            ApifyError::Parse(_) | ApifyError::RunFailed(_) | ApifyError::RunTimedOut { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ApifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApifyError::Parse(err.to_string());
        }
        ApifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApifyError {
    fn from(err: serde_json::Error) -> Self {
        ApifyError::Parse(err.to_string())
    }
}
