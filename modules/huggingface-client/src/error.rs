use thiserror::Error;

pub type Result<T> = std::result::Result<T, HfError>;

#[derive(Debug, Error)]
pub enum HfError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Model is still loading: {0}")]
    ModelLoading(String),

    #[error("Expected {expected} classifications, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

impl From<reqwest::Error> for HfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return HfError::Parse(err.to_string());
        }
        HfError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for HfError {
    fn from(err: serde_json::Error) -> Self {
        HfError::Parse(err.to_string())
    }
}
