pub mod characterize;
pub mod charts;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod fetch;
pub mod profile;
pub mod stats;
pub mod table;

pub use characterize::{characterize, RunReport, StageOutcome};
pub use dashboard::build_dashboard_model;
pub use error::PipelineError;
pub use fetch::{DataOrigin, FetchedDataset};
pub use profile::DatasetProfile;
pub use table::{Column, ColumnType, Table, Value};
