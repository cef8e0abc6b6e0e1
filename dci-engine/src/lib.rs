//! DCI test-result sync and comparison engine
//!
//! Turns JUnit reports fetched from the CI control plane into per-job files
//! under one directory per topic, then loads, compares and summarises them.

pub mod compare;
pub mod dataset;
pub mod junit;
pub mod report;
pub mod stats;
pub mod store;
pub mod sync;

pub use crate::compare::{compare, compare_datasets, ComparisonRequest, ComparisonResult, Delta, TargetReduction};
pub use crate::dataset::{load_dataset, topic_date_range, Dataset, DatasetQuery, Reduction};
pub use crate::junit::MissingDuration;
pub use crate::store::{JobStore, TagIndex};
pub use crate::sync::{JobOutcome, SyncError, SyncReport, Syncer};
