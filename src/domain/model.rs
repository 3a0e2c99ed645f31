use serde::{Deserialize, Serialize};
use std::fmt;

/// One batch of raw records returned by a single paged fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<serde_json::Value>,
    pub is_last_page: bool,
}

impl Page {
    /// A page is inferred to be the last one when it holds fewer records than requested.
    pub fn from_records(records: Vec<serde_json::Value>, page_size: u32) -> Self {
        let is_last_page = records.len() < page_size as usize;
        Self {
            records,
            is_last_page,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// An export-ready row: column names paired with their rendered values, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The very first page of the stream came back empty.
    NothingFound,
    /// An empty page followed at least one page with data.
    NoMorePages,
    /// A short page was persisted.
    LastPage,
    /// `max_records` was reached after a full page was persisted.
    RecordCap,
    /// A shutdown request was observed between pages.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::NothingFound => "nothing found",
            StopReason::NoMorePages => "no more pages",
            StopReason::LastPage => "reached the last page",
            StopReason::RecordCap => "record cap reached",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total_records_persisted: usize,
    pub records_dropped: usize,
    pub pages_persisted: u32,
    /// Last page whose rows reached the sink during this run.
    pub last_page_fetched: Option<u32>,
    pub stopped_reason: StopReason,
}
