pub mod types;
pub mod error;
pub mod config;

pub use types::*;
pub use error::{AnalysisError, Result};
pub use config::{AnalysisConfig, Credentials, HttpConfig, SyncConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MIN_TESTS_PER_JOB, 697);
        assert_eq!(TAG_INDEX_FILE, "index_tags.json");
        assert_eq!(JOB_FILE_EXTENSION, "csv");
    }
}
