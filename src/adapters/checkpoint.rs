use crate::core::CheckpointStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One small text file per stream holding the next page to fetch.
///
/// Streams whose source filters on a relative time window also keep the window's
/// absolute start next to the checkpoint, so a resumed run sees the same rows.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, stream_id: &str) -> PathBuf {
        self.dir.join(format!("{}_page.txt", stream_id))
    }

    pub fn window_path_for(&self, stream_id: &str) -> PathBuf {
        self.dir.join(format!("{}_since.txt", stream_id))
    }

    /// Returns the window start to use for this run.
    ///
    /// A stream in progress (checkpoint past page 1) keeps the start it was begun
    /// with; otherwise `fresh_start` is stored and returned.
    pub async fn pin_window_start(&self, stream_id: &str, fresh_start: i64) -> Result<i64> {
        if self.read(stream_id).await? > 1 {
            if let Some(pinned) = self.read_window_start(stream_id)? {
                tracing::info!(
                    "✓ Resuming `{}` with its original window start {}",
                    stream_id,
                    pinned
                );
                return Ok(pinned);
            }
            tracing::warn!(
                "⚠️ `{}` is in progress but has no stored window start; using {}",
                stream_id,
                fresh_start
            );
        }

        fs::create_dir_all(&self.dir)?;
        write_atomically(&self.window_path_for(stream_id), &fresh_start.to_string())?;
        Ok(fresh_start)
    }

    fn read_window_start(&self, stream_id: &str) -> Result<Option<i64>> {
        let path = self.window_path_for(stream_id);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content.trim().parse().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write-then-rename so a crash never leaves a truncated file behind.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("txt.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("✓ Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self, stream_id: &str) -> Result<u32> {
        let path = self.path_for(stream_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(e.into()),
        };

        match content.trim().parse::<u32>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => {
                tracing::warn!(
                    "⚠️ Invalid page number {:?} in {}; starting from page 1",
                    content.trim(),
                    path.display()
                );
                Ok(1)
            }
        }
    }

    async fn write(&self, stream_id: &str, next_page: u32) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_atomically(&self.path_for(stream_id), &next_page.to_string())?;

        tracing::debug!("Checkpoint for `{}` set to page {}", stream_id, next_page);
        Ok(())
    }

    async fn clear(&self, stream_id: &str) -> Result<bool> {
        let page_removed = remove_if_present(&self.path_for(stream_id))?;
        let window_removed = remove_if_present(&self.window_path_for(stream_id))?;
        Ok(page_removed || window_removed)
    }
}
