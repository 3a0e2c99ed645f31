pub mod targets;

pub use targets::{ExportTarget, RecordTransform};
