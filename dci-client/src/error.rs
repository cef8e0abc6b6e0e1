use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {uri}: {body}")]
    Status { uri: String, status: u16, body: String },

    #[error("No data from {0}: retries exhausted")]
    NoData(String),

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the control plane has no entity with the requested name
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
