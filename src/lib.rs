//! DCI analysis
//!
//! Syncs JUnit test results of DCI jobs into per-topic job files and compares
//! topics against each other. This crate re-exports the member crates.

pub use dci_client as client;
pub use dci_common as common;
pub use dci_engine as engine;

pub mod prelude {
    pub use dci_client::{CiApi, ClientError, ClientResult, DciClient};
    pub use dci_common::{AnalysisConfig, AnalysisError, Credentials, Job, JobFileName, Result};
    pub use dci_engine::stats::{
        coefficient_of_variation, comparison_histogram, percentile_trend, standard_deviation, Bucket,
    };
    pub use dci_engine::{
        compare, compare_datasets, load_dataset, topic_date_range, ComparisonRequest, ComparisonResult, Dataset,
        DatasetQuery, Delta, JobOutcome, JobStore, Reduction, SyncError, SyncReport, Syncer, TagIndex,
        TargetReduction,
    };
}
