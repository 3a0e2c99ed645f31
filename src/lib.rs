pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use adapters::{CsvSink, FileCheckpointStore, WooCommerceSource};
pub use app::ExportTarget;
pub use config::{ExportSettings, SiteConfig, SitesFile};
pub use core::exporter::{reset_stream, ExportOptions, PaginatedExporter, ResetOutcome};
pub use domain::model::{ExportSummary, Page, Record, StopReason};
pub use utils::error::{EtlError, RecordError, Result};
