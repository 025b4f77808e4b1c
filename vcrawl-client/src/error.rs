use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    HttpStatus(u16),

    #[error("{0}")]
    Collaborator(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Network-level failures the user may simply retry. They are never
    /// retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::HttpStatus(_))
    }

    /// Message suitable for showing to a user. Transport failures collapse into
    /// one generic retryable message, everything else is shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => "Network error occurred. Please try again.".to_string(),
            ClientError::HttpStatus(code) => {
                format!("Server error ({}). Please try again.", code)
            }
            other => other.to_string(),
        }
    }
}

/// A single stream frame that could not be turned into an event.
/// Never surfaced to callers; the decoder logs and drops it.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame has no data line")]
    MissingData,

    #[error("frame payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame payload has no event tag")]
    MissingTag,

    #[error("unknown event tag '{0}'")]
    UnknownTag(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
