use thiserror::Error;

/// Main error type for the analysis engine
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid job file {path}: {reason}")]
    InvalidJobFile { path: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<toml::de::Error> for AnalysisError {
    fn from(error: toml::de::Error) -> Self {
        AnalysisError::Config(error.to_string())
    }
}

impl AnalysisError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalysisError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
