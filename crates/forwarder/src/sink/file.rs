//! Rotating file sink.
//!
//! Lines are appended to `<directory>/<pattern>` where `{date}` in the
//! pattern is rendered as `YYYYMMDD` when the sink opens. Before a write
//! that would bring the file to `max_bytes` or beyond, the file rolls over:
//!
//! ```text
//! name.(N-1) → name.N   (old name.N is replaced)
//! ...
//! name.1     → name.2
//! name       → name.1
//! ```
//!
//! Rotation is disabled when `max_bytes` or `backup_count` is 0.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use logtap_core::types::LogRecord;

use crate::error::ForwarderError;
use crate::format::MessageFormat;
use crate::sink::Sink;

const SINK_NAME: &str = "file";

/// Resolved file sink settings.
#[derive(Debug, Clone)]
pub struct FileSinkSettings {
    pub directory: PathBuf,
    pub filename_pattern: String,
    pub max_bytes: u64,
    pub backup_count: u32,
    pub format: MessageFormat,
}

impl FileSinkSettings {
    /// File name for `date`.
    pub fn file_name(&self, date: NaiveDate) -> String {
        self.filename_pattern
            .replace("{date}", &date.format("%Y%m%d").to_string())
    }

    /// Full path of the log file for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.directory.join(self.file_name(date))
    }
}

/// Appends formatted records to a size-rotated file.
#[derive(Debug)]
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    format: MessageFormat,
    file: Option<File>,
    current_size: u64,
    closed: bool,
}

impl RotatingFileSink {
    /// Creates the directory if needed and opens today's file in append mode.
    pub async fn open(settings: &FileSinkSettings) -> Result<Self, ForwarderError> {
        let path = settings.path_for(chrono::Local::now().date_naive());
        Self::open_at(path, settings).await
    }

    /// Opens an explicit path with the rotation and format of `settings`.
    pub async fn open_at(
        path: PathBuf,
        settings: &FileSinkSettings,
    ) -> Result<Self, ForwarderError> {
        let mut sink = Self {
            path,
            max_bytes: settings.max_bytes,
            backup_count: settings.backup_count,
            format: settings.format.clone(),
            file: None,
            current_size: 0,
            closed: false,
        };
        if let Some(parent) = sink.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| open_error(&sink.path, &e))?;
        }
        sink.ensure_open()
            .await
            .map_err(|e| open_error(&sink.path, &e))?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of backup number `index` (1 is the newest).
    pub fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn should_rollover(&self, incoming: u64) -> bool {
        self.max_bytes > 0
            && self.backup_count > 0
            && self.current_size > 0
            && self.current_size + incoming >= self.max_bytes
    }

    async fn ensure_open(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.current_size = file.metadata().await?.len();
            self.file = Some(file);
        }
        Ok(())
    }

    async fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }

        for index in (1..self.backup_count).rev() {
            let src = self.backup_path(index);
            if exists(&src).await {
                let dst = self.backup_path(index + 1);
                if exists(&dst).await {
                    tokio::fs::remove_file(&dst).await?;
                }
                tokio::fs::rename(&src, &dst).await?;
            }
        }

        let first = self.backup_path(1);
        if exists(&first).await {
            tokio::fs::remove_file(&first).await?;
        }
        if exists(&self.path).await {
            tokio::fs::rename(&self.path, &first).await?;
        }

        self.current_size = 0;
        self.ensure_open().await?;
        Ok(())
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.ensure_open().await?;
        if self.should_rollover(line.len() as u64) {
            self.rotate().await?;
        }
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::other("log file unavailable"));
        };
        file.write_all(line).await?;
        file.flush().await?;
        self.current_size += line.len() as u64;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    async fn emit(&mut self, record: &LogRecord) -> Result<(), ForwarderError> {
        if self.closed {
            return Err(ForwarderError::SinkClosed(SINK_NAME.to_owned()));
        }
        let mut line = self.format.render(record);
        line.push('\n');
        if let Err(e) = self.write_line(line.as_bytes()).await {
            // Reopen on the next emit; the file may have been moved or deleted.
            self.file = None;
            return Err(ForwarderError::SinkEmit {
                sink: SINK_NAME.to_owned(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ForwarderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

fn open_error(path: &Path, err: &io::Error) -> ForwarderError {
    ForwarderError::SinkOpen {
        sink: format!("{SINK_NAME} ({})", path.display()),
        reason: err.to_string(),
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
