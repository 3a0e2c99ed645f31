use crate::domain::model::{ExportSummary, Record, StopReason};
use crate::domain::ports::{CheckpointStore, PageSource, RowSink};
use crate::utils::error::{RecordError, Result};
use crate::utils::monitor::SystemMonitor;
use crate::utils::shutdown::ShutdownSignal;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub page_size: u32,
    /// Pause between pages, as a courtesy to the remote API.
    pub page_delay: Duration,
    /// Stop once at least this many rows were persisted. Only checked between pages.
    pub max_records: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay: Duration::from_secs(1),
            max_records: None,
        }
    }
}

/// Outcome of [`reset_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub sink_removed: bool,
    pub checkpoint_cleared: bool,
}

/// Walks a paged source, persisting every page before recording it in the checkpoint.
///
/// The checkpoint for a stream is always the page after the last one whose rows
/// reached the sink, so an interrupted run re-delivers at most one page.
pub struct PaginatedExporter<S, K, C> {
    source: S,
    sink: K,
    checkpoints: C,
    options: ExportOptions,
    shutdown: ShutdownSignal,
    monitor: SystemMonitor,
}

impl<S, K, C> PaginatedExporter<S, K, C>
where
    S: PageSource,
    K: RowSink,
    C: CheckpointStore,
{
    pub fn new(source: S, sink: K, checkpoints: C, options: ExportOptions) -> Self {
        Self {
            source,
            sink,
            checkpoints,
            options,
            shutdown: ShutdownSignal::new(),
            monitor: SystemMonitor::default(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    pub async fn run<F>(&self, export_id: &str, transform: F) -> Result<ExportSummary>
    where
        F: Fn(&Value) -> std::result::Result<Record, RecordError>,
    {
        let page_size = self.options.page_size;
        let mut page = self.checkpoints.read(export_id).await?;

        tracing::info!(
            "🔄 Exporting `{}` from {} starting at page {}",
            export_id,
            self.source.describe(),
            page
        );

        let mut total_persisted = 0usize;
        let mut total_dropped = 0usize;
        let mut pages_persisted = 0u32;
        let mut last_page_fetched = None;

        let stopped_reason = loop {
            if self.shutdown.is_triggered() {
                tracing::warn!("⚠️ Stopping before page {}; progress has been saved", page);
                break StopReason::Interrupted;
            }

            tracing::debug!("📥 Fetching page {} (page size {})", page, page_size);
            let fetched = match self.source.fetch_page(page, page_size).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::error!(
                        "❌ Fetching page {} failed: {}; checkpoint stays at page {}",
                        page,
                        e,
                        page
                    );
                    return Err(e);
                }
            };

            if fetched.is_empty() {
                if page == 1 {
                    tracing::info!("❌ No records found for `{}`", export_id);
                    break StopReason::NothingFound;
                }
                tracing::info!("✓ No more records to fetch after page {}", page - 1);
                break StopReason::NoMorePages;
            }

            let (rows, dropped) = transform_page(page, &fetched.records, &transform);

            // Rows must be durable before the checkpoint moves past this page.
            let written = self.sink.append(export_id, &rows).await?;
            self.checkpoints
                .write(export_id, page.saturating_add(1))
                .await?;

            total_persisted += written;
            total_dropped += dropped;
            pages_persisted += 1;
            last_page_fetched = Some(page);

            tracing::info!(
                "✓ Page {}: fetched {}, persisted {}, dropped {} (total {})",
                page,
                fetched.len(),
                written,
                dropped,
                total_persisted
            );
            self.monitor.log_stats(&format!("Page {}", page));

            if let Some(cap) = self.options.max_records {
                if total_persisted >= cap {
                    tracing::info!("✓ Record cap of {} reached", cap);
                    break StopReason::RecordCap;
                }
            }

            if fetched.is_last_page {
                tracing::info!("✓ Reached the last page");
                break StopReason::LastPage;
            }

            if !self.options.page_delay.is_zero() {
                tokio::time::sleep(self.options.page_delay).await;
            }
            page += 1;
        };

        self.monitor.log_final_stats();
        tracing::info!(
            "✅ Finished `{}`: {} records persisted to {} ({})",
            export_id,
            total_persisted,
            self.sink.location(export_id),
            stopped_reason
        );

        Ok(ExportSummary {
            total_records_persisted: total_persisted,
            records_dropped: total_dropped,
            pages_persisted,
            last_page_fetched,
            stopped_reason,
        })
    }
}

fn transform_page<F>(page: u32, raw_records: &[Value], transform: &F) -> (Vec<Record>, usize)
where
    F: Fn(&Value) -> std::result::Result<Record, RecordError>,
{
    let mut rows = Vec::with_capacity(raw_records.len());
    let mut dropped = 0;

    for (index, raw) in raw_records.iter().enumerate() {
        match transform(raw) {
            Ok(record) => rows.push(record),
            Err(e) => {
                dropped += 1;
                let id = raw
                    .get("id")
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::warn!(
                    "⚠️ Skipping record #{} (id {}) on page {}: {}",
                    index + 1,
                    id,
                    page,
                    e
                );
            }
        }
    }

    (rows, dropped)
}

/// Returns a stream to its initial state. Safe to call on a stream that was never exported.
pub async fn reset_stream<K, C>(
    export_id: &str,
    sink: &K,
    checkpoints: &C,
) -> Result<ResetOutcome>
where
    K: RowSink + ?Sized,
    C: CheckpointStore + ?Sized,
{
    let sink_removed = sink.remove(export_id).await?;
    let checkpoint_cleared = checkpoints.clear(export_id).await?;

    if sink_removed || checkpoint_cleared {
        tracing::info!("🧹 Reset `{}`", export_id);
    } else {
        tracing::info!("ℹ️ Nothing to reset for `{}`", export_id);
    }

    Ok(ResetOutcome {
        sink_removed,
        checkpoint_cleared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Page;
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct ScriptedSource {
        pages: HashMap<u32, Vec<Value>>,
        fail_on: Option<u32>,
        interrupt_on: Option<(u32, ShutdownSignal)>,
        calls: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<Value>>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .enumerate()
                    .map(|(i, records)| (i as u32 + 1, records))
                    .collect(),
                fail_on: None,
                interrupt_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Trips `shutdown` while `page` is being fetched, like a Ctrl+C mid-request.
        fn interrupting_on(mut self, page: u32, shutdown: ShutdownSignal) -> Self {
            self.interrupt_on = Some((page, shutdown));
            self
        }

        fn failing_on(mut self, page: u32) -> Self {
            self.fail_on = Some(page);
            self
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page> {
            self.calls.lock().unwrap().push(page);
            if let Some((at, shutdown)) = &self.interrupt_on {
                if *at == page {
                    shutdown.trigger();
                }
            }
            if self.fail_on == Some(page) {
                return Err(EtlError::HttpStatusError {
                    status: 502,
                    url: format!("scripted://page/{}", page),
                });
            }
            let records = self.pages.get(&page).cloned().unwrap_or_default();
            Ok(Page::from_records(records, page_size))
        }

        fn describe(&self) -> String {
            "scripted source".to_string()
        }
    }

    /// Clones share their rows, so a second run can pick up what a first run left.
    #[derive(Default, Clone)]
    struct MemorySink {
        rows: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    }

    impl MemorySink {
        fn rows(&self, stream: &str) -> Vec<Record> {
            self.rows
                .lock()
                .unwrap()
                .get(stream)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl RowSink for MemorySink {
        async fn append(&self, stream_id: &str, rows: &[Record]) -> Result<usize> {
            self.rows
                .lock()
                .unwrap()
                .entry(stream_id.to_string())
                .or_default()
                .extend_from_slice(rows);
            Ok(rows.len())
        }

        async fn remove(&self, stream_id: &str) -> Result<bool> {
            Ok(self.rows.lock().unwrap().remove(stream_id).is_some())
        }

        fn location(&self, stream_id: &str) -> String {
            format!("memory://{}", stream_id)
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoints {
        pages: Arc<Mutex<HashMap<String, u32>>>,
        fail_write_of: Option<u32>,
    }

    impl MemoryCheckpoints {
        fn starting_at(stream: &str, page: u32) -> Self {
            let store = Self::default();
            store.pages.lock().unwrap().insert(stream.to_string(), page);
            store
        }

        fn get(&self, stream: &str) -> Option<u32> {
            self.pages.lock().unwrap().get(stream).copied()
        }

        /// A healthy store over the same saved pages.
        fn reopen(&self) -> Self {
            Self {
                pages: Arc::clone(&self.pages),
                fail_write_of: None,
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for MemoryCheckpoints {
        async fn read(&self, stream_id: &str) -> Result<u32> {
            Ok(self.get(stream_id).unwrap_or(1))
        }

        async fn write(&self, stream_id: &str, next_page: u32) -> Result<()> {
            if self.fail_write_of == Some(next_page) {
                return Err(EtlError::IoError(std::io::Error::other("simulated crash")));
            }
            self.pages
                .lock()
                .unwrap()
                .insert(stream_id.to_string(), next_page);
            Ok(())
        }

        async fn clear(&self, stream_id: &str) -> Result<bool> {
            Ok(self.pages.lock().unwrap().remove(stream_id).is_some())
        }
    }

    fn items(page: u32, count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                json!({
                    "id": page * 1000 + i as u32,
                    "name": format!("item {}.{}", page, i),
                })
            })
            .collect()
    }

    fn name_only(raw: &Value) -> std::result::Result<Record, RecordError> {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RecordError::missing("name"))?;
        Ok(Record::new().with("name", name))
    }

    fn options(page_size: u32, max_records: Option<usize>) -> ExportOptions {
        ExportOptions {
            page_size,
            page_delay: Duration::ZERO,
            max_records,
        }
    }

    #[tokio::test]
    async fn test_stops_on_empty_page_after_full_pages() {
        let source = ScriptedSource::new(vec![items(1, 50), items(2, 50), items(3, 50)]);
        let exporter = PaginatedExporter::new(
            source,
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(50, None),
        );

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::NoMorePages);
        assert_eq!(summary.last_page_fetched, Some(3));
        assert_eq!(summary.total_records_persisted, 150);
        assert_eq!(exporter.source().calls(), vec![1, 2, 3, 4]);
        assert_eq!(exporter.checkpoints().get("orders_default"), Some(4));
    }

    #[tokio::test]
    async fn test_short_page_ends_the_run() {
        let source = ScriptedSource::new(vec![items(1, 50), items(2, 10), items(3, 50)]);
        let exporter = PaginatedExporter::new(
            source,
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(50, None),
        );

        let summary = exporter.run("products_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::LastPage);
        assert_eq!(summary.last_page_fetched, Some(2));
        assert_eq!(summary.total_records_persisted, 60);
        assert_eq!(exporter.source().calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_record_cap_is_checked_after_whole_page() {
        let source = ScriptedSource::new(vec![items(1, 50), items(2, 50)]);
        let exporter = PaginatedExporter::new(
            source,
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(50, Some(25)),
        );

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::RecordCap);
        assert_eq!(summary.total_records_persisted, 50);
        assert_eq!(exporter.sink().rows("orders_default").len(), 50);
        assert_eq!(exporter.checkpoints().get("orders_default"), Some(2));
    }

    #[tokio::test]
    async fn test_bad_record_is_dropped_not_fatal() {
        let mut page = items(1, 5);
        page[2] = json!({"id": 3});
        let exporter = PaginatedExporter::new(
            ScriptedSource::new(vec![page]),
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(50, None),
        );

        let summary = exporter.run("products_default", name_only).await.unwrap();

        assert_eq!(summary.total_records_persisted, 4);
        assert_eq!(summary.records_dropped, 1);
        assert_eq!(summary.stopped_reason, StopReason::LastPage);
        assert_eq!(exporter.sink().rows("products_default").len(), 4);
    }

    #[tokio::test]
    async fn test_nothing_found_on_first_page() {
        let exporter = PaginatedExporter::new(
            ScriptedSource::new(vec![]),
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(50, None),
        );

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::NothingFound);
        assert_eq!(summary.last_page_fetched, None);
        assert_eq!(exporter.checkpoints().get("orders_default"), None);
    }

    #[tokio::test]
    async fn test_crash_between_append_and_checkpoint_replays_page() {
        let pages = vec![items(1, 10), items(2, 10), items(3, 10), items(4, 3)];
        let sink = MemorySink::default();

        // The checkpoint write recording page 2 as done (next = 3) fails.
        let crashing = PaginatedExporter::new(
            ScriptedSource::new(pages.clone()),
            sink.clone(),
            MemoryCheckpoints {
                fail_write_of: Some(3),
                ..Default::default()
            },
            options(10, None),
        );
        let err = crashing.run("orders_default", name_only).await.unwrap_err();
        assert!(matches!(err, EtlError::IoError(_)));
        assert_eq!(sink.rows("orders_default").len(), 20);
        assert_eq!(crashing.checkpoints().get("orders_default"), Some(2));

        let resumed = PaginatedExporter::new(
            ScriptedSource::new(pages),
            sink.clone(),
            crashing.checkpoints().reopen(),
            options(10, None),
        );
        let summary = resumed.run("orders_default", name_only).await.unwrap();

        assert_eq!(resumed.source().calls(), vec![2, 3, 4]);
        assert_eq!(summary.total_records_persisted, 23);
        assert_eq!(summary.stopped_reason, StopReason::LastPage);
        assert_eq!(resumed.checkpoints().get("orders_default"), Some(5));

        // Page 2 was delivered twice; every item of every page is present.
        let names: Vec<String> = sink
            .rows("orders_default")
            .iter()
            .map(|row| row.get("name").unwrap().to_string())
            .collect();
        assert_eq!(names.len(), 43);
        assert_eq!(&names[10..20], &names[20..30]);
        for page in 1..=4 {
            let first = format!("item {}.0", page);
            let expected = if page == 2 { 2 } else { 1 };
            assert_eq!(names.iter().filter(|name| **name == first).count(), expected);
        }
    }

    #[tokio::test]
    async fn test_transport_error_leaves_checkpoint_at_failed_page() {
        let source = ScriptedSource::new(vec![items(1, 10), items(2, 10), items(3, 10)]).failing_on(2);
        let exporter = PaginatedExporter::new(
            source,
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(10, None),
        );

        let err = exporter.run("orders_default", name_only).await.unwrap_err();

        assert!(matches!(err, EtlError::HttpStatusError { status: 502, .. }));
        assert_eq!(exporter.checkpoints().get("orders_default"), Some(2));
        assert_eq!(exporter.sink().rows("orders_default").len(), 10);
    }

    #[tokio::test]
    async fn test_resume_continues_from_stored_page() {
        let exporter = PaginatedExporter::new(
            ScriptedSource::new(vec![items(1, 10), items(2, 10), items(3, 4)]),
            MemorySink::default(),
            MemoryCheckpoints::starting_at("orders_default", 3),
            options(10, None),
        );

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(exporter.source().calls(), vec![3]);
        assert_eq!(summary.total_records_persisted, 4);
        assert_eq!(summary.last_page_fetched, Some(3));
    }

    #[tokio::test]
    async fn test_interrupt_is_honoured_between_pages() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let exporter = PaginatedExporter::new(
            ScriptedSource::new(vec![items(1, 10)]),
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(10, None),
        )
        .with_shutdown(shutdown);

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::Interrupted);
        assert!(exporter.source().calls().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_during_fetch_finishes_the_page() {
        let shutdown = ShutdownSignal::new();
        let source = ScriptedSource::new(vec![items(1, 10), items(2, 10)])
            .interrupting_on(1, shutdown.clone());
        let exporter = PaginatedExporter::new(
            source,
            MemorySink::default(),
            MemoryCheckpoints::default(),
            options(10, None),
        )
        .with_shutdown(shutdown);

        let summary = exporter.run("orders_default", name_only).await.unwrap();

        assert_eq!(summary.stopped_reason, StopReason::Interrupted);
        assert_eq!(summary.total_records_persisted, 10);
        assert_eq!(summary.last_page_fetched, Some(1));
        assert_eq!(exporter.sink().rows("orders_default").len(), 10);
        assert_eq!(exporter.checkpoints().get("orders_default"), Some(2));
        assert_eq!(exporter.source().calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let sink = MemorySink::default();
        let checkpoints = MemoryCheckpoints::starting_at("orders_default", 7);
        sink.append("orders_default", &[Record::new().with("name", "a")])
            .await
            .unwrap();

        let first = reset_stream("orders_default", &sink, &checkpoints)
            .await
            .unwrap();
        assert!(first.sink_removed && first.checkpoint_cleared);

        let second = reset_stream("orders_default", &sink, &checkpoints)
            .await
            .unwrap();
        assert_eq!(
            second,
            ResetOutcome {
                sink_removed: false,
                checkpoint_cleared: false
            }
        );
        assert_eq!(checkpoints.read("orders_default").await.unwrap(), 1);
    }
}
