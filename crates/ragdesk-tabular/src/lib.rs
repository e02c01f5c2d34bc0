//! # RagDesk Tabular
//!
//! Structured fallback for questions the documents cannot answer.
//!
//! Each department owns at most one CSV dataset, loaded from
//! `<data_dir>/<department>/*.csv` when the process starts. A question is
//! translated to SQL by the generation backend and run against a private
//! in-memory copy of the dataset, so concurrent queries share nothing
//! mutable.

pub mod dataset;
pub mod engine;
pub mod registry;

pub use dataset::Dataset;
pub use engine::{DepartmentAnswer, TabularEngine, TabularOutcome, is_useful};
pub use registry::{DatasetRegistry, DatasetSummary};
