use crate::domain::model::{Page, Record};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Anything that can hand out numbered pages of raw records.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `page` and `page_size` are both 1-based and positive.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page>;

    /// Human-readable origin, used in progress logs.
    fn describe(&self) -> String;
}

/// Append-only tabular storage addressed by stream id.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Appends rows durably. The first append for a fresh stream writes a header
    /// derived from the first row's columns. Returns the number of rows written.
    async fn append(&self, stream_id: &str, rows: &[Record]) -> Result<usize>;

    /// Deletes the stream's container. Returns `false` when there was nothing to delete.
    async fn remove(&self, stream_id: &str) -> Result<bool>;

    fn location(&self, stream_id: &str) -> String;
}

/// Persisted `stream id -> next page` cursor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Next page to fetch; 1 when nothing (or nothing readable) is stored.
    async fn read(&self, stream_id: &str) -> Result<u32>;

    async fn write(&self, stream_id: &str, next_page: u32) -> Result<()>;

    /// Returns `false` when there was no checkpoint.
    async fn clear(&self, stream_id: &str) -> Result<bool>;
}
