pub mod exporter;

pub use crate::domain::model::{ExportSummary, Page, Record, StopReason};
pub use crate::domain::ports::{CheckpointStore, PageSource, RowSink};
pub use crate::utils::error::Result;
