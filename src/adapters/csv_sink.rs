use crate::core::{Record, RowSink};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use csv::{QuoteStyle, WriterBuilder};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Append-only CSV files, one per stream: `{base_dir}/{stream}.csv` unless overridden.
#[derive(Debug, Clone)]
pub struct CsvSink {
    base_dir: PathBuf,
    overrides: HashMap<String, PathBuf>,
}

impl CsvSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            overrides: HashMap::new(),
        }
    }

    /// Routes one stream to an explicit file instead of the default location.
    pub fn with_output_override(mut self, stream_id: &str, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(stream_id.to_string(), path.into());
        self
    }

    pub fn path_for(&self, stream_id: &str) -> PathBuf {
        self.overrides
            .get(stream_id)
            .cloned()
            .unwrap_or_else(|| self.base_dir.join(format!("{}.csv", stream_id)))
    }
}

fn is_fresh(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RowSink for CsvSink {
    async fn append(&self, stream_id: &str, rows: &[Record]) -> Result<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        let path = self.path_for(stream_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let write_header = is_fresh(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .from_writer(file);

        if write_header {
            writer.write_record(first.columns())?;
        }
        for row in rows {
            writer.write_record(row.values())?;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))?;
        file.sync_all()?;

        tracing::debug!("Appended {} rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    async fn remove(&self, stream_id: &str) -> Result<bool> {
        let path = self.path_for(stream_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("✓ Removed {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self, stream_id: &str) -> String {
        self.path_for(stream_id).display().to_string()
    }
}
